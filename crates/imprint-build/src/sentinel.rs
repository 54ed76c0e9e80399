//! Sentinel markers: cheap proof that a target's current inputs were built.
//!
//! A marker is a small JSON file at [`TargetDescriptor::sentinel`]:
//!
//! ```json
//! {
//!   "target": "image",
//!   "fingerprint": "9f2c…",
//!   "reference": "ghcr.io/org/app:9f2c…",
//!   "built_at": 1760000000
//! }
//! ```
//!
//! Markers only ever skip work. They never name an artifact; the
//! fingerprint does. A marker is written after the build procedure has fully
//! succeeded, via temp file + rename, so an interrupted build cannot leave a
//! marker that claims freshness.

use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use imprint_core::{ArtifactReference, Staleness, TargetDescriptor};
use serde::{Deserialize, Serialize};

/// Persisted marker contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinel {
    pub target: String,
    pub fingerprint: String,
    pub reference: String,
    /// Unix seconds
    pub built_at: u64,
}

/// Reads and writes sentinel markers. Each target owns its own file.
#[derive(Debug, Clone, Copy)]
pub struct SentinelStore {
    staleness: Staleness,
}

impl SentinelStore {
    pub fn new(staleness: Staleness) -> Self {
        Self { staleness }
    }

    /// Whether the last successful build still covers `reference`.
    ///
    /// Missing, unreadable and corrupt markers are stale.
    pub fn is_fresh(&self, target: &TargetDescriptor, reference: &ArtifactReference) -> bool {
        match self.staleness {
            Staleness::Fingerprint => match self.read(target) {
                Ok(Some(sentinel)) => sentinel.fingerprint == reference.fingerprint().as_str(),
                Ok(None) => false,
                // arch-lint: allow(no-error-swallowing) reason="an unreadable or corrupt marker is stale; the build rewrites it"
                Err(e) => {
                    tracing::warn!(name = %target.name, error = %e, "ignoring unreadable sentinel");
                    false
                }
            },
            Staleness::Mtime => newer_than_inputs(target),
        }
    }

    /// Record a successful build. Atomic; safe to repeat.
    pub fn mark_built(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), SentinelError> {
        let sentinel = Sentinel {
            target: target.name.clone(),
            fingerprint: reference.fingerprint().to_string(),
            reference: reference.to_string(),
            built_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(SentinelError::Clock)?
                .as_secs(),
        };
        let content = serde_json::to_vec_pretty(&sentinel).map_err(SentinelError::Serialize)?;

        let path = &target.sentinel;
        let dir = path
            .parent()
            .ok_or_else(|| SentinelError::InvalidPath(path.clone()))?;
        std::fs::create_dir_all(dir).map_err(SentinelError::CreateDir)?;

        // Unique temp file per writer: racing writers each rename a complete file.
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(SentinelError::Write)?;
        temp.write_all(&content).map_err(SentinelError::Write)?;
        temp.as_file().sync_all().map_err(SentinelError::Write)?;
        temp.persist(path).map_err(|e| SentinelError::Write(e.error))?;

        tracing::debug!(name = %target.name, path = %path.display(), "sentinel written");
        Ok(())
    }

    /// Drop the marker so the next build runs the procedure. Absent markers are fine.
    pub fn invalidate(&self, target: &TargetDescriptor) -> Result<(), SentinelError> {
        match std::fs::remove_file(&target.sentinel) {
            Ok(()) => {
                tracing::debug!(name = %target.name, "sentinel removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SentinelError::Remove(e)),
        }
    }

    /// Load the marker, `Ok(None)` if the target was never built.
    pub fn read(&self, target: &TargetDescriptor) -> Result<Option<Sentinel>, SentinelError> {
        let content = match std::fs::read(&target.sentinel) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SentinelError::Read(e)),
        };
        serde_json::from_slice(&content).map(Some).map_err(SentinelError::Parse)
    }
}

/// Marker mtime is not older than any input's mtime.
fn newer_than_inputs(target: &TargetDescriptor) -> bool {
    let marker = match std::fs::metadata(&target.sentinel).and_then(|m| m.modified()) {
        Ok(marker) => marker,
        // arch-lint: allow(no-error-swallowing) reason="no marker mtime means never built, which is stale"
        Err(e) => {
            tracing::debug!(name = %target.name, error = %e, "no sentinel mtime; stale");
            return false;
        }
    };

    target.inputs.paths().iter().all(|input| {
        match std::fs::metadata(input).and_then(|m| m.modified()) {
            Ok(modified) => modified <= marker,
            // arch-lint: allow(no-error-swallowing) reason="an input without an mtime cannot prove freshness; hashing reports the real error"
            Err(e) => {
                tracing::debug!(input = %input.display(), error = %e, "input mtime unavailable; stale");
                false
            }
        }
    })
}

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("failed to read sentinel: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write sentinel: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to create sentinel directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("failed to parse sentinel: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize sentinel: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to remove sentinel: {0}")]
    Remove(#[source] std::io::Error),

    #[error("sentinel path {0} has no parent directory")]
    InvalidPath(PathBuf),

    #[error("system clock is before the unix epoch")]
    Clock(#[source] std::time::SystemTimeError),
}
