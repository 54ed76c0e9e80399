//! Walks the dependency graph and brings a selection of targets up to date.
//!
//! Per target, in build order:
//!
//! ```text
//! prerequisite failed?  ── yes → SkippedDependencyFailed
//! fingerprint           ── error → Failed
//! sentinel fresh?       ── yes → SkippedFresh
//! cache restore         ── hit → SkippedCacheRestored   (errors count as a miss)
//! builder               ── Built | SkippedOverride | Failed
//! publish to cache      ── Built only, failures logged
//! ```

use std::collections::HashMap;

use imprint_core::{ArtifactReference, Project, TargetDescriptor};
use imprint_docker::{CacheBridge, CommandExecutor, RealExecutor};

use crate::builder::{BuildAction, BuildError, BuildOptions, Builder};
use crate::graph::{DependencyGraph, GraphError};
use crate::report::{BuildReport, TargetReport, TargetStatus};

/// Options for one orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub build: BuildOptions,
    /// Consult the cache bridge before building.
    pub restore_from_cache: bool,
    /// Push freshly built artifacts to the cache bridge.
    pub publish_to_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            restore_from_cache: true,
            publish_to_cache: false,
        }
    }
}

pub struct Orchestrator<'a, C: CacheBridge, E: CommandExecutor = RealExecutor> {
    project: &'a Project,
    graph: DependencyGraph,
    builder: &'a Builder<E>,
    cache: &'a C,
}

impl<'a, C: CacheBridge, E: CommandExecutor> Orchestrator<'a, C, E> {
    /// Fails on unknown dependencies and cycles before anything runs.
    pub fn new(
        project: &'a Project,
        builder: &'a Builder<E>,
        cache: &'a C,
    ) -> Result<Self, GraphError> {
        let graph = DependencyGraph::new(&project.targets)?;
        Ok(Self {
            project,
            graph,
            builder,
            cache,
        })
    }

    /// Build `selection` and everything it depends on. An empty selection means all targets.
    pub async fn run(
        &self,
        selection: &[String],
        options: RunOptions,
    ) -> Result<BuildReport, GraphError> {
        let order = if selection.is_empty() {
            self.graph.build_order()
        } else {
            self.graph.closure(selection)?
        };

        tracing::info!(
            targets = order.len(),
            skip_build = options.build.skip_build,
            cache = self.cache.backend(),
            "starting build"
        );

        let mut report = BuildReport::default();
        // target name → name of the target whose own failure blocks it
        let mut failed: HashMap<String, String> = HashMap::new();

        for name in order {
            let target = self.descriptor(name)?;

            let blocked_by = self
                .graph
                .prerequisites(name)?
                .into_iter()
                .find_map(|dep| failed.get(dep).cloned());
            if let Some(dependency) = blocked_by {
                tracing::warn!(name, %dependency, "not built: prerequisite failed");
                failed.insert(name.to_owned(), dependency.clone());
                report.push(TargetReport {
                    name: name.to_owned(),
                    reference: None,
                    status: TargetStatus::SkippedDependencyFailed { dependency },
                });
                continue;
            }

            let entry = self.run_target(target, options).await;
            if matches!(entry.status, TargetStatus::Failed { .. }) {
                failed.insert(name.to_owned(), name.to_owned());
            }
            report.push(entry);
        }

        Ok(report)
    }

    async fn run_target(&self, target: &TargetDescriptor, options: RunOptions) -> TargetReport {
        let reference = match self.builder.reference(target) {
            Ok(reference) => reference,
            Err(e) => return failed_report(target, None, &e),
        };

        if self.builder.is_fresh(target, &reference) {
            tracing::info!(name = %target.name, %reference, "up to date");
            return TargetReport {
                name: target.name.clone(),
                reference: Some(reference),
                status: TargetStatus::SkippedFresh,
            };
        }

        if options.restore_from_cache {
            match self.cache.try_restore(target, &reference).await {
                Ok(true) => {
                    tracing::info!(name = %target.name, %reference, backend = self.cache.backend(), "restored from cache");
                    return TargetReport {
                        name: target.name.clone(),
                        reference: Some(reference),
                        status: TargetStatus::SkippedCacheRestored,
                    };
                }
                Ok(false) => {
                    tracing::debug!(name = %target.name, %reference, "cache miss");
                }
                // arch-lint: allow(no-error-swallowing) reason="a broken cache backend degrades to a miss and a real build"
                Err(e) => {
                    tracing::warn!(name = %target.name, error = %e, "cache restore failed; treating as miss");
                }
            }
        }

        let outcome = match self
            .builder
            .build_as(target, reference.clone(), options.build)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return failed_report(target, Some(reference), &e),
        };

        let status = match outcome.action {
            BuildAction::Built => {
                if options.publish_to_cache {
                    self.publish(target, &outcome.reference).await;
                }
                TargetStatus::Built
            }
            BuildAction::Fresh => TargetStatus::SkippedFresh,
            BuildAction::Skipped => TargetStatus::SkippedOverride,
        };

        TargetReport {
            name: target.name.clone(),
            reference: Some(outcome.reference),
            status,
        }
    }

    async fn publish(&self, target: &TargetDescriptor, reference: &ArtifactReference) {
        match self.cache.store(target, reference).await {
            Ok(()) => {
                tracing::info!(name = %target.name, %reference, backend = self.cache.backend(), "published to cache");
            }
            // arch-lint: allow(no-error-swallowing) reason="the artifact is built locally; a failed publish only costs a later rebuild"
            Err(e) => {
                tracing::warn!(name = %target.name, error = %e, "cache publish failed");
            }
        }
    }

    fn descriptor(&self, name: &str) -> Result<&'a TargetDescriptor, GraphError> {
        self.project
            .targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| GraphError::UnknownTarget(name.to_owned()))
    }
}

fn failed_report(
    target: &TargetDescriptor,
    reference: Option<ArtifactReference>,
    error: &BuildError,
) -> TargetReport {
    tracing::error!(name = %target.name, error = %error, "target failed");
    TargetReport {
        name: target.name.clone(),
        reference,
        status: TargetStatus::Failed {
            reason: error_chain(error),
            exit_status: error.exit_status(),
        },
    }
}

/// `error: cause: cause` on one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // transparent wrappers repeat their inner message
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn error_chain_joins_sources() {
        assert_eq!(error_chain(&Outer(Inner)), "outer: inner");
    }
}
