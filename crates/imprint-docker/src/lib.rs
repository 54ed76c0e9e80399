//! Docker CLI operations and artifact cache backends for imprint.
//!
//! All external processes go through [`CommandExecutor`], so every docker
//! interaction can be replaced by a mock in tests.

pub mod cache;
pub mod client;
pub mod exec;
pub mod executor;

pub use cache::{ArchiveCache, CacheBridge, CacheError, ConfiguredCache, NoCache, RegistryCache};
pub use client::{DockerClient, DockerError};
pub use exec::ExecError;
pub use executor::{CommandExecutor, RealExecutor};
