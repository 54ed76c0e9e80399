use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ImprintConfig, ProcedureConfig, Settings, TargetConfig};
use crate::fingerprint::{Fingerprint, Hasher, InputSet};

/// Floating alias applied next to the fingerprint tag.
pub const LATEST_TAG: &str = "latest";

/// Fully-qualified artifact name: `repository:fingerprint`.
///
/// Always derived from a fingerprint; recomputing it from unchanged inputs
/// reproduces the same reference.
///
/// # Examples
///
/// ```
/// use imprint_core::{ArtifactReference, Hasher};
///
/// let fp = Hasher::default().hash_bytes([b"FROM x".as_slice()]);
/// let reference = ArtifactReference::new("ghcr.io/org/app", fp.clone());
/// assert_eq!(reference.to_string(), format!("ghcr.io/org/app:{fp}"));
/// assert_eq!(reference.latest(), "ghcr.io/org/app:latest");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactReference {
    repository: String,
    fingerprint: Fingerprint,
}

impl ArtifactReference {
    pub fn new(repository: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            repository: repository.into(),
            fingerprint,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// `repository:latest`. Convenience for consumers, never identity.
    pub fn latest(&self) -> String {
        format!("{}:{LATEST_TAG}", self.repository)
    }
}

impl std::fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository, self.fingerprint)
    }
}

/// Resolved build procedure. Paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Procedure {
    Docker {
        dockerfile: PathBuf,
        context: PathBuf,
        args: BTreeMap<String, String>,
    },
    Command {
        program: String,
        args: Vec<String>,
    },
}

impl Procedure {
    /// Substitute `{reference}`, `{repository}` and `{fingerprint}` in
    /// command arguments.
    pub fn render_args(args: &[String], reference: &ArtifactReference) -> Vec<String> {
        let rendered = reference.to_string();
        args.iter()
            .map(|arg| {
                arg.replace("{reference}", &rendered)
                    .replace("{repository}", reference.repository())
                    .replace("{fingerprint}", reference.fingerprint().as_str())
            })
            .collect()
    }
}

/// One buildable artifact, immutable once loaded.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub name: String,
    pub repository: String,
    pub inputs: InputSet,
    pub procedure: Procedure,
    /// Marker file recording the last successful build
    pub sentinel: PathBuf,
    /// Prerequisite target names, in declaration order
    pub depends_on: Vec<String>,
    pub floating_alias: bool,
    /// Directory build procedures run from (the project root)
    pub working_dir: PathBuf,
}

impl TargetDescriptor {
    /// Resolve a target declaration against the project root.
    pub fn from_config(config: &TargetConfig, root: &Path, settings: &Settings) -> Self {
        let procedure = match &config.build {
            ProcedureConfig::Docker {
                dockerfile,
                context,
                args,
            } => Procedure::Docker {
                dockerfile: root.join(dockerfile),
                context: root.join(context),
                args: args.clone(),
            },
            ProcedureConfig::Command { program, args } => Procedure::Command {
                program: program.clone(),
                args: args.clone(),
            },
        };

        Self {
            name: config.name.clone(),
            repository: config.repository.clone(),
            inputs: InputSet::new(config.inputs.iter().map(|p| root.join(p)).collect()),
            procedure,
            sentinel: root
                .join(&settings.sentinel_dir)
                .join(format!("{}.json", config.name)),
            depends_on: config.depends_on.clone(),
            floating_alias: config.floating_alias,
            working_dir: root.to_path_buf(),
        }
    }

    /// Hash the inputs and name the artifact.
    pub fn reference(&self, hasher: &Hasher) -> crate::Result<ArtifactReference> {
        let fingerprint = hasher.hash(&self.inputs)?;
        Ok(ArtifactReference::new(self.repository.clone(), fingerprint))
    }
}

/// A loaded project: config plus resolved targets.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ImprintConfig,
    pub targets: Vec<TargetDescriptor>,
}

impl Project {
    /// Load `imprint.toml` (or `config_file`) from `root` and resolve targets.
    pub fn load(root: &Path, config_file: Option<&Path>) -> crate::Result<Self> {
        let config = ImprintConfig::load(root, config_file)?;
        Ok(Self::from_config(root, config))
    }

    pub fn from_config(root: &Path, config: ImprintConfig) -> Self {
        let targets = config
            .targets
            .iter()
            .map(|t| TargetDescriptor::from_config(t, root, &config.settings))
            .collect();
        Self {
            root: root.to_path_buf(),
            config,
            targets,
        }
    }

    pub fn hasher(&self) -> Hasher {
        Hasher::new(self.config.settings.normalize_line_endings)
    }

    pub fn sentinel_dir(&self) -> PathBuf {
        self.root.join(&self.config.settings.sentinel_dir)
    }

    pub fn target(&self, name: &str) -> crate::Result<&TargetDescriptor> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| crate::Error::UnknownTarget {
                name: name.to_owned(),
                declared: self.target_names(),
            })
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }
}
