use imprint_build::SentinelStore;

use super::ProjectArgs;

pub fn invalidate(args: &ProjectArgs, targets: &[String]) -> anyhow::Result<()> {
    let project = args.load()?;
    let sentinels = SentinelStore::new(project.config.settings.staleness);

    let selected = if targets.is_empty() {
        project.targets.iter().collect()
    } else {
        targets
            .iter()
            .map(|name| project.target(name))
            .collect::<Result<Vec<_>, _>>()?
    };

    for target in selected {
        sentinels.invalidate(target)?;
        println!("invalidated {}", target.name);
    }
    Ok(())
}
