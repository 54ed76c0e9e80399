use anyhow::Context;
use imprint_core::{ArtifactReference, Project, TargetDescriptor};
use imprint_docker::{CacheBridge, ConfiguredCache};

use super::ProjectArgs;

fn configured(project: &Project) -> anyhow::Result<ConfiguredCache> {
    let cache = ConfiguredCache::from_config(&project.config.cache, &project.root);
    if !cache.is_enabled() {
        anyhow::bail!("no cache backend configured; set [cache].backend in imprint.toml");
    }
    Ok(cache)
}

fn current_reference(
    project: &Project,
    target: &TargetDescriptor,
) -> anyhow::Result<ArtifactReference> {
    target
        .reference(&project.hasher())
        .with_context(|| format!("cannot fingerprint target '{}'", target.name))
}

/// Exits non-zero on a miss so pipelines can fall back to `imprint build`.
pub async fn cache_restore(args: &ProjectArgs, target: &str) -> anyhow::Result<()> {
    let project = args.load()?;
    let cache = configured(&project)?;
    let target = project.target(target)?;
    let reference = current_reference(&project, target)?;

    if !cache.try_restore(target, &reference).await? {
        anyhow::bail!("cache miss for '{}' ({reference})", target.name);
    }
    println!("{reference}");
    Ok(())
}

pub async fn cache_save(args: &ProjectArgs, target: &str) -> anyhow::Result<()> {
    let project = args.load()?;
    let cache = configured(&project)?;
    let target = project.target(target)?;
    let reference = current_reference(&project, target)?;

    cache.store(target, &reference).await?;
    println!("{reference}");
    Ok(())
}
