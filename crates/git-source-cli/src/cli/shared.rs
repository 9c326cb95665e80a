use super::*;

/// Config file plus the global overrides given on the command line.
pub(super) struct CliContext {
    pub(super) config: AppConfig,
    pub(super) config_path: PathBuf,
    cache_root_override: Option<PathBuf>,
}

impl CliContext {
    pub(super) fn load(
        config_path: Option<PathBuf>,
        cache_root_override: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config = AppConfig::load(&config_path)
            .with_context(|| format!("load config {}", config_path.display()))?;
        Ok(Self {
            config,
            config_path,
            cache_root_override,
        })
    }

    pub(super) fn cache_root(&self) -> anyhow::Result<PathBuf> {
        match &self.cache_root_override {
            Some(root) => Ok(root.clone()),
            None => self.config.cache_root(),
        }
    }
}

pub(super) fn render_sync_progress(last_len: &Cell<usize>, progress: &SyncProgress) {
    let total = progress.total_repos;
    let processed = progress.processed_repos.min(total);
    let bar = render_progress_bar(processed, total, 20);
    let repo = progress.repo_name.as_deref().unwrap_or("-");
    let line = format!(
        "{}/{} {} action={} repo={}",
        processed,
        total,
        bar,
        progress.action.as_str(),
        repo
    );
    let prev_len = last_len.get();
    if line.len() < prev_len {
        print!("\r{line}{}", " ".repeat(prev_len - line.len()));
    } else {
        print!("\r{line}");
    }
    let _ = io::stdout().flush();
    last_len.set(line.len());
    if !progress.in_progress || matches!(progress.action, SyncAction::Done) {
        println!();
        last_len.set(0);
    }
}

pub(super) fn render_progress_bar(processed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", "-".repeat(width));
    }
    let filled = (processed * width / total).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub(super) fn format_repo_report(report: &RepoReport) -> String {
    match (&report.outcome, &report.error) {
        (Some(outcome), None) => {
            let mut line = format!(
                "{} {} ref={} files={}",
                report.name,
                outcome,
                report.git_ref.as_deref().unwrap_or("-"),
                report.files
            );
            if let Some(link) = &report.web_link {
                line.push_str(&format!(" web={link}"));
            }
            line
        }
        (_, Some(error)) => format!(
            "{} failed kind={} error={}",
            report.name,
            report.error_kind.unwrap_or("unknown"),
            error
        ),
        (None, None) => format!("{} skipped", report.name),
    }
}

pub(super) fn print_summary(summary: SyncSummary) {
    println!(
        "Total: cloned={} refreshed={} unchanged={} failed={} files={} records_created={} records_updated={} records_unchanged={}",
        summary.cloned,
        summary.refreshed,
        summary.unchanged,
        summary.failed,
        summary.files,
        summary.records_created,
        summary.records_updated,
        summary.records_unchanged
    );
}

pub(super) fn describe_state(state: &MirrorState, expected_remote: &str) -> String {
    match state {
        MirrorState::Mirror { remote } if remote.trim() == expected_remote.trim() => {
            "ok".to_string()
        }
        MirrorState::Mirror { remote } => format!("drift (origin {remote})"),
        MirrorState::Foreign => "drift (not a mirror)".to_string(),
        other => other.as_str().to_string(),
    }
}

pub(super) fn manifest_path(
    override_path: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path),
        None => config.manifest_path(),
    }
}
