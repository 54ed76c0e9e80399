use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE: &str = "imprint.toml";

/// imprint.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImprintConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Targets in declaration order. The order is significant: it breaks
    /// ties in the build order.
    #[serde(default, rename = "target")]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding sentinel markers, relative to the project root
    #[serde(default = "default_sentinel_dir")]
    pub sentinel_dir: PathBuf,
    /// How sentinel freshness is decided
    #[serde(default)]
    pub staleness: Staleness,
    /// Hash `\r\n` as `\n` so CRLF and LF checkouts share fingerprints
    #[serde(default = "default_true")]
    pub normalize_line_endings: bool,
}

/// Sentinel freshness strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Staleness {
    /// Fresh when the marker records the current fingerprint.
    #[default]
    Fingerprint,
    /// Fresh when the marker is not older than any input file.
    Mtime,
}

/// External artifact cache used to skip local builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    None,
    /// Artifacts are pushed to and pulled from a registry. With `registry`
    /// set the key is `<registry>/<target>:<fingerprint>`; without it the
    /// artifact reference itself is the key.
    Registry {
        #[serde(default)]
        registry: Option<String>,
    },
    /// Artifacts are saved as image archives in a local (CI-cached) directory.
    Archive {
        #[serde(default = "default_archive_dir")]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Stable target name, also used as the sentinel file name
    pub name: String,
    /// Repository the artifact is tagged under, without a tag
    pub repository: String,
    /// Files whose content determines the fingerprint, in hashing order
    pub inputs: Vec<PathBuf>,
    /// Targets that must be built first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Tag `<repository>:latest` after every successful build
    #[serde(default = "default_true")]
    pub floating_alias: bool,
    pub build: ProcedureConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProcedureConfig {
    /// `docker build` of a Dockerfile.
    Docker {
        #[serde(default = "default_dockerfile")]
        dockerfile: PathBuf,
        #[serde(default = "default_context")]
        context: PathBuf,
        /// `--build-arg` values
        #[serde(default)]
        args: BTreeMap<String, String>,
    },
    /// Arbitrary command, run from the project root.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sentinel_dir: default_sentinel_dir(),
            staleness: Staleness::default(),
            normalize_line_endings: true,
        }
    }
}

impl ImprintConfig {
    /// Load and validate the config file.
    ///
    /// `config_file` is resolved against `project_dir` when relative;
    /// `None` means [`CONFIG_FILE`].
    pub fn load(project_dir: &Path, config_file: Option<&Path>) -> crate::Result<Self> {
        let config_path = match config_file {
            Some(file) => project_dir.join(file),
            None => project_dir.join(CONFIG_FILE),
        };
        if !config_path.exists() {
            return Err(crate::Error::ConfigNotFound { path: config_path });
        }

        let content =
            std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                path: config_path.clone(),
                source: e,
            })?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: config_path.clone(),
            source: e,
        })?;

        config.validate()?;
        tracing::debug!(
            path = %config_path.display(),
            targets = config.targets.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Check target declarations for problems that would otherwise surface
    /// mid-build. Dependency references are checked by the dependency graph.
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(crate::Error::DuplicateTarget(target.name.clone()));
            }
            target.validate()?;
        }
        Ok(())
    }
}

impl TargetConfig {
    fn validate(&self) -> crate::Result<()> {
        let invalid = |reason: &str| crate::Error::InvalidTarget {
            target: self.name.clone(),
            reason: reason.to_owned(),
        };

        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            || self.name.starts_with('.')
        {
            return Err(invalid(
                "name must be non-empty and use only [A-Za-z0-9._-], not starting with '.'",
            ));
        }
        if self.repository.trim().is_empty() {
            return Err(invalid("repository must not be empty"));
        }
        // A ':' after the last '/' is a tag; a ':' before it is a registry port.
        let last_segment = match self.repository.rsplit_once('/') {
            Some((_, last)) => last,
            None => self.repository.as_str(),
        };
        if last_segment.contains(':') || self.repository.contains('@') {
            return Err(invalid(
                "repository must not carry a tag or digest; the fingerprint is the tag",
            ));
        }
        if self.inputs.is_empty() {
            return Err(invalid("at least one input file must be declared"));
        }
        if let ProcedureConfig::Command { program, .. } = &self.build
            && program.trim().is_empty()
        {
            return Err(invalid("command program must not be empty"));
        }
        Ok(())
    }
}

fn default_sentinel_dir() -> PathBuf {
    PathBuf::from(".sentinel")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(".cache/images")
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}
