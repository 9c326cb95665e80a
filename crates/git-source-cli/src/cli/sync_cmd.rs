use super::shared::{format_repo_report, manifest_path, print_summary, render_sync_progress};
use super::*;
pub(super) fn handle_sync(args: SyncArgs, context: &CliContext) -> anyhow::Result<()> {
    let config = &context.config;
    config
        .validate()
        .with_context(|| format!("invalid config {}", context.config_path.display()))?;
    let repos = config.select(&args.repo)?;
    if repos.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }

    let cache_root = context.cache_root()?;
    let manifest_path = manifest_path(args.manifest, config)?;
    let jobs = args.jobs.unwrap_or(config.jobs());
    if jobs == 0 {
        anyhow::bail!("--jobs must be at least 1");
    }
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .or(config.timeout());
    if args.depth < 0 {
        anyhow::bail!("--depth must not be negative");
    }
    let options = SyncOptions::new(&cache_root)
        .with_jobs(jobs)
        .with_depth(args.depth)
        .with_timeout(timeout);
    let ingestor = GlobIngestor {
        include_dotfiles: args.include_dotfiles,
    };

    let mut registry = ManifestRegistry::load(&manifest_path)?;
    for repo in &config.repos {
        if !repos.iter().any(|selected| selected.name == repo.name) {
            registry.keep_source(&repo.name);
        }
    }

    info!(
        repos = repos.len(),
        jobs,
        cache_root = %cache_root.display(),
        "Starting sync"
    );
    let last_len = Cell::new(0usize);
    let progress_fn = |progress: SyncProgress| render_sync_progress(&last_len, &progress);
    let progress: Option<&dyn Fn(SyncProgress)> = if args.progress {
        Some(&progress_fn)
    } else {
        None
    };
    let report = run_sync(&repos, &options, &ingestor, &mut registry, progress)?;

    for repo in &report.repos {
        println!("{}", format_repo_report(repo));
    }
    print_summary(report.summary);

    let pruned = registry
        .save(&manifest_path)
        .with_context(|| format!("save manifest {}", manifest_path.display()))?;
    if pruned > 0 {
        info!(pruned, "Dropped records not seen in this run");
    }
    println!("Manifest saved to {}", manifest_path.display());

    if report.has_failures() {
        anyhow::bail!(
            "{} of {} repositories failed",
            report.summary.failed,
            report.repos.len()
        );
    }
    Ok(())
}
