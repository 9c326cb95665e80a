use super::*;
pub(super) fn handle_validate(context: &CliContext) -> anyhow::Result<()> {
    let config = &context.config;
    config
        .validate()
        .with_context(|| format!("invalid config {}", context.config_path.display()))?;
    for repo in &config.repos {
        RemoteUrl::parse(&repo.remote)
            .with_context(|| format!("repository {:?}", repo.name))?;
    }
    println!(
        "Config {} is valid: {} repositories",
        context.config_path.display(),
        config.repos.len()
    );
    for repo in &config.repos {
        println!(
            "  {} remote={} branch={} patterns={}",
            repo.name,
            repo.remote,
            repo.branch.as_deref().unwrap_or("(remote default)"),
            repo.patterns.join(",")
        );
    }
    Ok(())
}
