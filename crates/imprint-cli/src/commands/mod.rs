mod build;
mod cache;
mod inspect;
mod invalidate;
mod order;
mod status;

use std::path::PathBuf;

use imprint_build::{Builder, SentinelStore};
use imprint_core::Project;
use imprint_docker::DockerClient;

pub use build::{BuildFlags, build};
pub use cache::{cache_restore, cache_save};
pub use inspect::{fingerprint, reference, repository};
pub use invalidate::invalidate;
pub use order::order;
pub use status::status;

/// Where to find the project, from the global flags.
pub struct ProjectArgs {
    pub dir: PathBuf,
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn load(&self) -> anyhow::Result<Project> {
        Ok(Project::load(&self.dir, self.config.as_deref())?)
    }
}

fn builder(project: &Project) -> Builder {
    Builder::new(
        DockerClient::new(),
        SentinelStore::new(project.config.settings.staleness),
        project.hasher(),
    )
}
