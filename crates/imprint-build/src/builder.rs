use imprint_core::{ArtifactReference, Hasher, Procedure, TargetDescriptor};
use imprint_docker::{CommandExecutor, DockerClient, DockerError, ExecError, RealExecutor};

use crate::sentinel::{SentinelError, SentinelStore};

/// Per-invocation build options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Never run a build procedure; trust that the artifact already exists
    /// (restored from cache or built by an earlier pipeline stage).
    pub skip_build: bool,
}

/// What [`Builder::build`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildAction {
    /// The procedure ran and succeeded.
    Built,
    /// The sentinel covered the current fingerprint.
    Fresh,
    /// `skip_build` was set.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub reference: ArtifactReference,
    pub action: BuildAction,
}

/// Runs build procedures when, and only when, a target is out of date.
pub struct Builder<E: CommandExecutor = RealExecutor> {
    client: DockerClient<E>,
    sentinels: SentinelStore,
    hasher: Hasher,
}

impl<E: CommandExecutor> Builder<E> {
    pub fn new(client: DockerClient<E>, sentinels: SentinelStore, hasher: Hasher) -> Self {
        Self {
            client,
            sentinels,
            hasher,
        }
    }

    pub fn sentinels(&self) -> &SentinelStore {
        &self.sentinels
    }

    /// Fingerprint the target's inputs and name its artifact.
    pub fn reference(&self, target: &TargetDescriptor) -> Result<ArtifactReference, BuildError> {
        target
            .reference(&self.hasher)
            .map_err(|e| BuildError::Fingerprint {
                target: target.name.clone(),
                source: e,
            })
    }

    pub fn is_fresh(&self, target: &TargetDescriptor, reference: &ArtifactReference) -> bool {
        self.sentinels.is_fresh(target, reference)
    }

    /// Bring `target` up to date and return its artifact reference.
    ///
    /// 1. Fingerprint the inputs (failure is fatal: there is no name to build under).
    /// 2. `skip_build` → return the reference untouched.
    /// 3. Fresh sentinel → return the reference.
    /// 4. Run the procedure with the reference as output name, apply the
    ///    floating alias, write the sentinel.
    ///
    /// Failures are not retried; retrying is the calling pipeline's call.
    pub async fn build(
        &self,
        target: &TargetDescriptor,
        options: BuildOptions,
    ) -> Result<BuildOutcome, BuildError> {
        let reference = self.reference(target)?;
        self.build_as(target, reference, options).await
    }

    /// [`Builder::build`] for a reference the caller already computed.
    pub async fn build_as(
        &self,
        target: &TargetDescriptor,
        reference: ArtifactReference,
        options: BuildOptions,
    ) -> Result<BuildOutcome, BuildError> {
        if options.skip_build {
            tracing::info!(name = %target.name, %reference, "build skipped by override");
            return Ok(BuildOutcome {
                reference,
                action: BuildAction::Skipped,
            });
        }

        if self.is_fresh(target, &reference) {
            tracing::info!(name = %target.name, %reference, "up to date");
            return Ok(BuildOutcome {
                reference,
                action: BuildAction::Fresh,
            });
        }

        tracing::info!(name = %target.name, %reference, "building");
        self.run_procedure(target, &reference).await?;

        if target.floating_alias {
            self.client
                .tag(&reference.to_string(), &reference.latest())
                .await
                .map_err(|e| BuildError::Alias {
                    target: target.name.clone(),
                    source: e,
                })?;
        }

        self.sentinels
            .mark_built(target, &reference)
            .map_err(|e| BuildError::Sentinel {
                target: target.name.clone(),
                source: e,
            })?;

        tracing::info!(name = %target.name, %reference, "built");
        Ok(BuildOutcome {
            reference,
            action: BuildAction::Built,
        })
    }

    async fn run_procedure(
        &self,
        target: &TargetDescriptor,
        reference: &ArtifactReference,
    ) -> Result<(), BuildError> {
        let result = match &target.procedure {
            Procedure::Docker {
                dockerfile,
                context,
                args,
            } => self
                .client
                .build_image(
                    dockerfile,
                    context,
                    args,
                    &reference.to_string(),
                    &target.working_dir,
                )
                .await
                .map_err(ProcedureError::Docker),
            Procedure::Command { program, args } => self
                .client
                .run_procedure(
                    program,
                    &Procedure::render_args(args, reference),
                    &target.working_dir,
                )
                .await
                .map_err(ProcedureError::Command),
        };

        result.map_err(|e| {
            let exit_status = e.exit_status();
            tracing::error!(name = %target.name, ?exit_status, error = %e, "build procedure failed");
            BuildError::BuildFailed {
                target: target.name.clone(),
                exit_status,
                source: e,
            }
        })
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error(transparent)]
    Docker(DockerError),

    #[error(transparent)]
    Command(ExecError),
}

impl ProcedureError {
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::Docker(e) => e.exit_status(),
            Self::Command(e) => e.exit_status(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cannot fingerprint target '{target}'")]
    Fingerprint {
        target: String,
        source: imprint_core::Error,
    },

    #[error("build of target '{target}' failed ({})", format_status(*exit_status))]
    BuildFailed {
        target: String,
        exit_status: Option<i32>,
        source: ProcedureError,
    },

    #[error("failed to apply floating alias for target '{target}'")]
    Alias { target: String, source: DockerError },

    #[error("failed to record sentinel for target '{target}'")]
    Sentinel {
        target: String,
        source: SentinelError,
    },
}

impl BuildError {
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::BuildFailed { exit_status, .. } => *exit_status,
            _ => None,
        }
    }
}

fn format_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_owned(),
    }
}
