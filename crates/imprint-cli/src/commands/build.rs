use imprint_build::{BuildOptions, Orchestrator, RunOptions};
use imprint_docker::ConfiguredCache;

use super::ProjectArgs;

pub struct BuildFlags {
    pub skip_build: bool,
    pub no_cache: bool,
    pub publish: bool,
}

/// Build the selection (all targets when empty) and print the report.
pub async fn build(
    args: &ProjectArgs,
    targets: &[String],
    flags: BuildFlags,
) -> anyhow::Result<()> {
    let project = args.load()?;
    let builder = super::builder(&project);
    let cache = ConfiguredCache::from_config(&project.config.cache, &project.root);
    let orchestrator = Orchestrator::new(&project, &builder, &cache)?;

    let options = RunOptions {
        build: BuildOptions {
            skip_build: flags.skip_build,
        },
        restore_from_cache: !flags.no_cache && cache.is_enabled(),
        publish_to_cache: flags.publish && cache.is_enabled(),
    };
    if flags.publish && !cache.is_enabled() {
        tracing::warn!("--publish has no effect: no cache backend configured");
    }

    let report = orchestrator.run(targets, options).await?;
    print!("{report}");

    if !report.is_success() {
        let failed: Vec<&str> = report.failed().map(|t| t.name.as_str()).collect();
        anyhow::bail!("build failed: {}", failed.join(", "));
    }
    Ok(())
}
