use super::shared::describe_state;
use super::*;
pub(super) fn handle_status(context: &CliContext) -> anyhow::Result<()> {
    let repos = &context.config.repos;
    if repos.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }
    let cache_root = context.cache_root()?;
    println!("Cache root: {}", cache_root.display());
    for repo in repos {
        let path = mirror_path(&cache_root, &repo.name);
        match mirror_status(&path) {
            Ok(status) => println!(
                "{} state={} branch={} head={}",
                repo.name,
                describe_state(&status.state, &repo.remote),
                status.branch.as_deref().unwrap_or("-"),
                status
                    .head_commit
                    .as_deref()
                    .map(short_commit)
                    .unwrap_or("-")
            ),
            Err(err) => println!("{} state=error error={err}", repo.name),
        }
    }
    Ok(())
}

fn short_commit(commit: &str) -> &str {
    commit.get(..10).unwrap_or(commit)
}
