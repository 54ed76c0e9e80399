use std::fmt;

use imprint_core::ArtifactReference;

/// Final state of one target after an orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Built,
    SkippedFresh,
    SkippedCacheRestored,
    /// Build suppressed by the skip-build override and nothing was restored.
    SkippedOverride,
    Failed {
        reason: String,
        exit_status: Option<i32>,
    },
    /// Not attempted because `dependency` (a transitive prerequisite) failed.
    SkippedDependencyFailed {
        dependency: String,
    },
}

impl TargetStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::SkippedDependencyFailed { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::SkippedFresh => "fresh",
            Self::SkippedCacheRestored => "restored",
            Self::SkippedOverride => "skipped",
            Self::Failed { .. } => "FAILED",
            Self::SkippedDependencyFailed { .. } => "blocked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub name: String,
    /// `None` only when the inputs could not be fingerprinted, or the target was never reached.
    pub reference: Option<ArtifactReference>,
    pub status: TargetStatus,
}

/// Per-target results in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    pub fn push(&mut self, report: TargetReport) {
        self.targets.push(report);
    }

    pub fn get(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn status(&self, name: &str) -> Option<&TargetStatus> {
        self.get(name).map(|t| &t.status)
    }

    /// Targets whose own procedure failed (not those blocked by a failure).
    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets
            .iter()
            .filter(|t| matches!(t.status, TargetStatus::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        !self.targets.iter().any(|t| t.status.is_failure())
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .targets
            .iter()
            .map(|t| t.name.len())
            .fold(0, usize::max);

        for t in &self.targets {
            write!(f, "{:<8} {:<width$}", t.status.label(), t.name)?;
            if let Some(reference) = &t.reference {
                write!(f, "  {reference}")?;
            }
            match &t.status {
                TargetStatus::Failed { reason, .. } => write!(f, "  ({reason})")?,
                TargetStatus::SkippedDependencyFailed { dependency } => {
                    write!(f, "  (dependency '{dependency}' failed)")?
                }
                _ => {}
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, status: TargetStatus) -> TargetReport {
        TargetReport {
            name: name.to_owned(),
            reference: None,
            status,
        }
    }

    #[test]
    fn success_requires_no_failed_or_blocked_targets() {
        let mut ok = BuildReport::default();
        ok.push(report("a", TargetStatus::Built));
        ok.push(report("b", TargetStatus::SkippedFresh));
        ok.push(report("c", TargetStatus::SkippedOverride));
        assert!(ok.is_success());

        let mut blocked = ok.clone();
        blocked.push(report(
            "d",
            TargetStatus::SkippedDependencyFailed {
                dependency: "x".to_owned(),
            },
        ));
        assert!(!blocked.is_success());
        assert_eq!(blocked.failed().count(), 0);
    }

    #[test]
    fn failed_lists_targets_whose_procedure_failed() {
        let mut r = BuildReport::default();
        r.push(report(
            "a",
            TargetStatus::Failed {
                reason: "boom".to_owned(),
                exit_status: Some(3),
            },
        ));
        assert_eq!(r.failed().next().map(|t| t.name.as_str()), Some("a"));
    }

    #[test]
    fn display_names_blocking_dependency() {
        let mut r = BuildReport::default();
        r.push(report(
            "frontend",
            TargetStatus::SkippedDependencyFailed {
                dependency: "nodejs".to_owned(),
            },
        ));
        let text = r.to_string();
        assert!(text.contains("blocked"));
        assert!(text.contains("dependency 'nodejs' failed"));
    }
}
