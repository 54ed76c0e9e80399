use imprint_build::DependencyGraph;

use super::ProjectArgs;

pub fn order(args: &ProjectArgs, waves: bool) -> anyhow::Result<()> {
    let project = args.load()?;
    let graph = DependencyGraph::new(&project.targets)?;

    if waves {
        for wave in graph.waves() {
            println!("{}", wave.join(" "));
        }
    } else {
        for name in graph.build_order() {
            println!("{name}");
        }
    }
    Ok(())
}
