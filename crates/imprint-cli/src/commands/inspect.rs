use anyhow::Context;

use super::ProjectArgs;

pub fn repository(args: &ProjectArgs, target: &str) -> anyhow::Result<()> {
    let project = args.load()?;
    println!("{}", project.target(target)?.repository);
    Ok(())
}

pub fn fingerprint(args: &ProjectArgs, target: &str) -> anyhow::Result<()> {
    let project = args.load()?;
    let target = project.target(target)?;
    let fingerprint = project
        .hasher()
        .hash(&target.inputs)
        .with_context(|| format!("cannot fingerprint target '{}'", target.name))?;
    println!("{fingerprint}");
    Ok(())
}

pub fn reference(args: &ProjectArgs, target: &str) -> anyhow::Result<()> {
    let project = args.load()?;
    let target = project.target(target)?;
    let reference = target
        .reference(&project.hasher())
        .with_context(|| format!("cannot fingerprint target '{}'", target.name))?;
    println!("{reference}");
    Ok(())
}
