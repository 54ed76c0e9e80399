use std::collections::BTreeMap;
use std::path::Path;

use crate::exec::ExecError;
use crate::executor::{CommandExecutor, RealExecutor};

const DOCKER: &str = "docker";

/// Docker CLI operations, parameterized over the executor for testability.
pub struct DockerClient<E: CommandExecutor = RealExecutor> {
    executor: E,
}

impl DockerClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor,
        }
    }
}

impl Default for DockerClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CommandExecutor> DockerClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Build ──

    /// `docker build -t <tag> -f <dockerfile> [--build-arg K=V]... <context>`
    pub async fn build_image(
        &self,
        dockerfile: &Path,
        context: &Path,
        build_args: &BTreeMap<String, String>,
        tag: &str,
        cwd: &Path,
    ) -> Result<(), DockerError> {
        let mut cmd = args(["build", "-t", tag]);
        cmd.push("-f".to_owned());
        cmd.push(path_arg(dockerfile)?);
        for (key, value) in build_args {
            cmd.push("--build-arg".to_owned());
            cmd.push(format!("{key}={value}"));
        }
        cmd.push(path_arg(context)?);

        self.executor
            .exec_streaming(DOCKER, &cmd, cwd)
            .await
            .map_err(|e| DockerError::Build {
                tag: tag.to_owned(),
                source: e,
            })
    }

    /// Run an arbitrary build command through the same executor.
    pub async fn run_procedure(
        &self,
        program: &str,
        procedure_args: &[String],
        cwd: &Path,
    ) -> Result<(), ExecError> {
        self.executor
            .exec_streaming(program, procedure_args, cwd)
            .await
    }

    // ── Images ──

    pub async fn tag(&self, source: &str, target: &str) -> Result<(), DockerError> {
        self.executor
            .exec(DOCKER, &args(["tag", source, target]))
            .await
            .map(|_| ())
            .map_err(|e| DockerError::Tag {
                source_ref: source.to_owned(),
                target_ref: target.to_owned(),
                source: e,
            })
    }

    // ── Registry ──

    /// Pull an image. Returns `false` when the registry does not have it
    /// (or cannot be reached); errors only when docker itself is unusable.
    pub async fn pull(&self, reference: &str) -> Result<bool, DockerError> {
        match self
            .executor
            .exec(DOCKER, &args(["pull", "--quiet", reference]))
            .await
        {
            Ok(_) => Ok(true),
            // arch-lint: allow(no-error-swallowing) reason="a registry without the image is a cache miss"
            Err(e @ ExecError::CommandFailed { .. }) => {
                tracing::debug!(reference, error = %e, "pull failed");
                Ok(false)
            }
            Err(e) => Err(DockerError::Pull {
                reference: reference.to_owned(),
                source: e,
            }),
        }
    }

    pub async fn push(&self, reference: &str) -> Result<(), DockerError> {
        self.executor
            .exec(DOCKER, &args(["push", "--quiet", reference]))
            .await
            .map(|_| ())
            .map_err(|e| DockerError::Push {
                reference: reference.to_owned(),
                source: e,
            })
    }

    // ── Archives ──

    pub async fn save(&self, reference: &str, archive: &Path) -> Result<(), DockerError> {
        let archive_str = path_arg(archive)?;
        self.executor
            .exec(DOCKER, &args(["save", "-o", &archive_str, reference]))
            .await
            .map(|_| ())
            .map_err(|e| DockerError::Save {
                reference: reference.to_owned(),
                source: e,
            })
    }

    pub async fn load(&self, archive: &Path) -> Result<(), DockerError> {
        let archive_str = path_arg(archive)?;
        self.executor
            .exec(DOCKER, &args(["load", "--quiet", "-i", &archive_str]))
            .await
            .map(|_| ())
            .map_err(|e| DockerError::Load {
                archive: archive.to_path_buf(),
                source: e,
            })
    }
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

fn path_arg(path: &Path) -> Result<String, DockerError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| DockerError::InvalidPath(path.to_path_buf()))
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("docker build of {tag} failed")]
    Build { tag: String, source: ExecError },

    #[error("failed to tag {source_ref} as {target_ref}")]
    Tag {
        source_ref: String,
        target_ref: String,
        source: ExecError,
    },

    #[error("failed to pull {reference}")]
    Pull {
        reference: String,
        source: ExecError,
    },

    #[error("failed to push {reference}")]
    Push {
        reference: String,
        source: ExecError,
    },

    #[error("failed to save {reference}")]
    Save {
        reference: String,
        source: ExecError,
    },

    #[error("failed to load archive {archive}")]
    Load {
        archive: std::path::PathBuf,
        source: ExecError,
    },
}

impl DockerError {
    /// Exit code of the failed docker invocation, when it ran at all.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::InvalidPath(_) => None,
            Self::Build { source, .. }
            | Self::Tag { source, .. }
            | Self::Pull { source, .. }
            | Self::Push { source, .. }
            | Self::Save { source, .. }
            | Self::Load { source, .. } => source.exit_status(),
        }
    }
}
