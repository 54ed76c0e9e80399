use imprint_build::{DependencyGraph, SentinelStore};

use super::ProjectArgs;

/// One line per target in build order: `fresh|stale|error  name  reference`.
pub fn status(args: &ProjectArgs) -> anyhow::Result<()> {
    let project = args.load()?;
    let graph = DependencyGraph::new(&project.targets)?;
    let sentinels = SentinelStore::new(project.config.settings.staleness);
    let hasher = project.hasher();

    let order = graph.build_order();
    let width = order.iter().map(|n| n.len()).fold(0, usize::max);

    for name in order {
        let target = project.target(name)?;
        match target.reference(&hasher) {
            Ok(reference) => {
                let state = if sentinels.is_fresh(target, &reference) {
                    "fresh"
                } else {
                    "stale"
                };
                println!("{state:<6} {name:<width$}  {reference}");
            }
            // arch-lint: allow(no-error-swallowing) reason="status reports every target; the error is the row"
            Err(e) => println!("{:<6} {name:<width$}  {e}", "error"),
        }
    }
    Ok(())
}
