use super::*;
pub(super) fn handle_describe(args: DescribeArgs) -> anyhow::Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => RemoteUrl::parse(&args.remote)?.name,
    };
    let descriptor = build_descriptor(&name, &args.remote, &args.git_ref)?;
    let digest = descriptor.content_digest()?;
    let json = serde_json::to_string_pretty(&descriptor).context("serialize descriptor")?;
    println!("{json}");
    println!("digest: {digest}");
    Ok(())
}
