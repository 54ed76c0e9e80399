//! Incremental, dependency-ordered builds for imprint.
//!
//! # Build pipeline
//!
//! ```text
//! imprint build
//!   1. Graph       ── DependencyGraph::new() (unknown deps, cycles)
//!   2. Order       ── build_order() / closure(selection)
//!   3. Fingerprint ── Hasher over each target's declared inputs
//!   4. Sentinel    ── fresh? skip
//!   5. Cache       ── CacheBridge::try_restore()
//!   6. Build       ── docker build / command, :latest alias, sentinel
//!   7. Report      ── BuildReport
//! ```
//!
//! The sentinel only ever saves work. The artifact's identity is the
//! `repository:fingerprint` reference, which the builder, the cache bridge
//! and every downstream consumer derive the same way.

pub mod builder;
pub mod graph;
pub mod orchestrator;
pub mod report;
pub mod sentinel;

pub use builder::{BuildAction, BuildError, BuildOptions, BuildOutcome, Builder, ProcedureError};
pub use graph::{DependencyGraph, GraphError};
pub use orchestrator::{Orchestrator, RunOptions};
pub use report::{BuildReport, TargetReport, TargetStatus};
pub use sentinel::{Sentinel, SentinelError, SentinelStore};
