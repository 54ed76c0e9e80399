//! Core types and configuration for imprint.
//!
//! This crate defines the `imprint.toml` schema ([`ImprintConfig`]),
//! resolved build targets ([`TargetDescriptor`], [`Project`]), content
//! fingerprinting ([`Hasher`]), and shared error types.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod target;

pub use config::{
    CONFIG_FILE, CacheConfig, ImprintConfig, ProcedureConfig, Settings, Staleness, TargetConfig,
};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, Hasher, InputSet};
pub use target::{ArtifactReference, LATEST_TAG, Procedure, Project, TargetDescriptor};
