//! Cache bridge: restore previously built artifacts instead of rebuilding.
//!
//! The cache key is always derived from the [`ArtifactReference`] the
//! builder would produce, so the cache key space and the local naming space
//! are the same space. A restored artifact is materialized locally under the
//! exact `repository:fingerprint` name, plus the floating `:latest` alias
//! that downstream build stages consume.
//!
//! | backend  | key                                                   | restore            | store              |
//! |----------|-------------------------------------------------------|--------------------|--------------------|
//! | none     | —                                                     | always a miss      | no-op              |
//! | registry | the reference, or `<registry>/<target>:<fingerprint>` | `docker pull`      | `docker push`      |
//! | archive  | `<dir>/<reference, '/' and ':' → '_'>.tar`            | `docker load -i`   | `docker save -o`   |

use std::path::{Path, PathBuf};

use imprint_core::{ArtifactReference, CacheConfig, TargetDescriptor};

use crate::client::{DockerClient, DockerError};
use crate::executor::{CommandExecutor, RealExecutor};

/// External artifact cache, keyed by artifact reference.
#[allow(async_fn_in_trait)]
pub trait CacheBridge {
    /// Materialize `reference` locally from the cache.
    ///
    /// Returns `Ok(false)` on a miss, leaving local state untouched.
    async fn try_restore(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<bool, CacheError>;

    /// Publish a locally built `reference` so later runs can restore it.
    async fn store(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), CacheError>;

    /// Short backend name for reports and logs.
    fn backend(&self) -> &'static str;
}

/// Cache that never hits.
pub struct NoCache;

impl CacheBridge for NoCache {
    async fn try_restore(
        &self,
        _target: &TargetDescriptor,
        _reference: &ArtifactReference,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn store(
        &self,
        _target: &TargetDescriptor,
        _reference: &ArtifactReference,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}

// ── Registry ──

/// Registry-backed cache.
pub struct RegistryCache<E: CommandExecutor = RealExecutor> {
    client: DockerClient<E>,
    /// Mirror registry prefix; `None` pulls and pushes the reference itself
    registry: Option<String>,
}

impl<E: CommandExecutor> RegistryCache<E> {
    pub fn new(client: DockerClient<E>, registry: Option<String>) -> Self {
        Self { client, registry }
    }

    /// Name the artifact is stored under in the registry.
    pub fn cache_key(&self, target: &TargetDescriptor, reference: &ArtifactReference) -> String {
        match &self.registry {
            Some(registry) => format!(
                "{}/{}:{}",
                registry.trim_end_matches('/'),
                target.name,
                reference.fingerprint()
            ),
            None => reference.to_string(),
        }
    }
}

impl<E: CommandExecutor> CacheBridge for RegistryCache<E> {
    async fn try_restore(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<bool, CacheError> {
        let key = self.cache_key(target, reference);
        if !self.client.pull(&key).await? {
            tracing::info!(name = %target.name, %key, "cache miss");
            return Ok(false);
        }

        let local = reference.to_string();
        if key != local {
            self.client.tag(&key, &local).await?;
        }
        if target.floating_alias {
            self.client.tag(&local, &reference.latest()).await?;
        }
        tracing::info!(name = %target.name, %key, "restored from registry cache");
        Ok(true)
    }

    async fn store(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), CacheError> {
        let key = self.cache_key(target, reference);
        let local = reference.to_string();
        if key != local {
            self.client.tag(&local, &key).await?;
        }
        self.client.push(&key).await?;
        tracing::info!(name = %target.name, %key, "stored in registry cache");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "registry"
    }
}

// ── Archive ──

/// Directory of `docker save` archives, typically persisted by a CI cache step.
pub struct ArchiveCache<E: CommandExecutor = RealExecutor> {
    client: DockerClient<E>,
    dir: PathBuf,
}

impl<E: CommandExecutor> ArchiveCache<E> {
    pub fn new(client: DockerClient<E>, dir: PathBuf) -> Self {
        Self { client, dir }
    }

    /// Archive path for a reference.
    ///
    /// `_` escapes itself as `__`, `/` as `_s` and `:` as `_c`, so distinct
    /// references never share a file name.
    pub fn archive_path(&self, reference: &ArtifactReference) -> PathBuf {
        let mut file_name = String::new();
        for c in reference.to_string().chars() {
            match c {
                '_' => file_name.push_str("__"),
                '/' => file_name.push_str("_s"),
                ':' => file_name.push_str("_c"),
                c => file_name.push(c),
            }
        }
        self.dir.join(format!("{file_name}.tar"))
    }
}

impl<E: CommandExecutor> CacheBridge for ArchiveCache<E> {
    async fn try_restore(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<bool, CacheError> {
        let archive = self.archive_path(reference);
        if !archive.is_file() {
            tracing::info!(name = %target.name, archive = %archive.display(), "cache miss");
            return Ok(false);
        }

        // `docker save <ref>` records the tag, so loading restores `reference` itself.
        self.client.load(&archive).await?;
        if target.floating_alias {
            self.client
                .tag(&reference.to_string(), &reference.latest())
                .await?;
        }
        tracing::info!(name = %target.name, archive = %archive.display(), "restored from archive cache");
        Ok(true)
    }

    async fn store(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::CreateDir {
            path: self.dir.clone(),
            source: e,
        })?;

        // Save next to the final name, then rename: a killed save never
        // leaves a truncated archive under a restorable name.
        let archive = self.archive_path(reference);
        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".tar")
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::CreateDir {
                path: self.dir.clone(),
                source: e,
            })?
            .into_temp_path();

        self.client.save(&reference.to_string(), &partial).await?;
        partial.persist(&archive).map_err(|e| CacheError::Persist {
            path: archive.clone(),
            source: e.error,
        })?;

        tracing::info!(name = %target.name, archive = %archive.display(), "stored in archive cache");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "archive"
    }
}

// ── Configured backend ──

/// The backend selected in `imprint.toml`.
pub enum ConfiguredCache<E: CommandExecutor = RealExecutor> {
    None(NoCache),
    Registry(RegistryCache<E>),
    Archive(ArchiveCache<E>),
}

impl ConfiguredCache<RealExecutor> {
    /// Build the configured backend; archive paths resolve against `root`.
    pub fn from_config(config: &CacheConfig, root: &Path) -> Self {
        Self::with_client(config, root, DockerClient::new)
    }
}

impl<E: CommandExecutor> ConfiguredCache<E> {
    pub fn with_client(
        config: &CacheConfig,
        root: &Path,
        client: impl FnOnce() -> DockerClient<E>,
    ) -> Self {
        match config {
            CacheConfig::None => Self::None(NoCache),
            CacheConfig::Registry { registry } => {
                Self::Registry(RegistryCache::new(client(), registry.clone()))
            }
            CacheConfig::Archive { dir } => {
                Self::Archive(ArchiveCache::new(client(), root.join(dir)))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None(_))
    }
}

impl<E: CommandExecutor> CacheBridge for ConfiguredCache<E> {
    async fn try_restore(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<bool, CacheError> {
        match self {
            Self::None(cache) => cache.try_restore(target, reference).await,
            Self::Registry(cache) => cache.try_restore(target, reference).await,
            Self::Archive(cache) => cache.try_restore(target, reference).await,
        }
    }

    async fn store(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), CacheError> {
        match self {
            Self::None(cache) => cache.store(target, reference).await,
            Self::Registry(cache) => cache.store(target, reference).await,
            Self::Archive(cache) => cache.store(target, reference).await,
        }
    }

    fn backend(&self) -> &'static str {
        match self {
            Self::None(cache) => cache.backend(),
            Self::Registry(cache) => cache.backend(),
            Self::Archive(cache) => cache.backend(),
        }
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error("failed to create cache directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to move archive into place at {path}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}
