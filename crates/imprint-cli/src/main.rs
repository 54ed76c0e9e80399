mod commands;

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "imprint",
    about = "Content-addressed incremental builds for container images"
)]
#[command(version)]
struct Cli {
    /// Project root containing imprint.toml
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Config file, relative to the project root (default: imprint.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a target's repository
    Repository { target: String },
    /// Print a target's input fingerprint
    Fingerprint { target: String },
    /// Print a target's artifact reference (repository:fingerprint)
    Reference { target: String },
    /// Build targets and their prerequisites (default: all targets)
    Build {
        targets: Vec<String>,
        /// Never run build procedures; rely on the cache or existing artifacts
        #[arg(
            long,
            env = "IMPRINT_SKIP_BUILD",
            action = ArgAction::SetTrue,
            value_parser = FalseyValueParser::new()
        )]
        skip_build: bool,
        /// Do not restore from or publish to the configured cache
        #[arg(long)]
        no_cache: bool,
        /// Publish freshly built artifacts to the configured cache
        #[arg(long, conflicts_with = "no_cache")]
        publish: bool,
    },
    /// Print the build order, one target per line
    Order {
        /// Group targets that can be built concurrently, one group per line
        #[arg(long)]
        waves: bool,
    },
    /// Show each target's reference and freshness
    Status,
    /// Drop sentinels so the next build reruns procedures (default: all targets)
    Invalidate { targets: Vec<String> },
    /// Drive the configured cache directly
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Restore a target's current artifact from the cache; fails on a miss
    Restore { target: String },
    /// Publish a target's locally built artifact to the cache
    Save { target: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let project = commands::ProjectArgs {
        dir: cli.project_dir,
        config: cli.config,
    };

    match cli.command {
        Commands::Repository { target } => commands::repository(&project, &target)?,
        Commands::Fingerprint { target } => commands::fingerprint(&project, &target)?,
        Commands::Reference { target } => commands::reference(&project, &target)?,
        Commands::Build {
            targets,
            skip_build,
            no_cache,
            publish,
        } => {
            commands::build(
                &project,
                &targets,
                commands::BuildFlags {
                    skip_build,
                    no_cache,
                    publish,
                },
            )
            .await?
        }
        Commands::Order { waves } => commands::order(&project, waves)?,
        Commands::Status => commands::status(&project)?,
        Commands::Invalidate { targets } => commands::invalidate(&project, &targets)?,
        Commands::Cache { action } => match action {
            CacheAction::Restore { target } => commands::cache_restore(&project, &target).await?,
            CacheAction::Save { target } => commands::cache_save(&project, &target).await?,
        },
    }

    Ok(())
}
