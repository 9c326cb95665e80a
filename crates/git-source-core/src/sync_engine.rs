use crate::cancel::CancelToken;
use crate::descriptor::{RepositoryDescriptor, build_descriptor};
use crate::digest::content_digest;
use crate::error::{MirrorError, Result};
use crate::git_sync::{SHALLOW_DEPTH, synchronize};
use crate::ingest::{FileIngestor, FileRecord};
use crate::lockfile::MirrorLock;
use crate::model::{MirrorSync, RepositoryConfig, SyncOutcome};
use crate::paths::{lock_path, mirror_path};
use crate::registry::{RegisterOutcome, Registry, RegistryRecord};
use crate::sync_engine_workers::run_work_items;
use anyhow::Context;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type SyncProgressReporter<'a> = dyn Fn(SyncProgress) + 'a;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    Starting,
    Syncing,
    Cloned,
    Refreshed,
    Unchanged,
    Failed,
    Done,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Starting => "starting",
            SyncAction::Syncing => "syncing",
            SyncAction::Cloned => "cloned",
            SyncAction::Refreshed => "refreshed",
            SyncAction::Unchanged => "unchanged",
            SyncAction::Failed => "failed",
            SyncAction::Done => "done",
        }
    }
}

impl From<SyncOutcome> for SyncAction {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Cloned => SyncAction::Cloned,
            SyncOutcome::Refreshed { changed: true } => SyncAction::Refreshed,
            SyncOutcome::Refreshed { changed: false } => SyncAction::Unchanged,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncProgress {
    pub total_repos: usize,
    pub processed_repos: usize,
    pub action: SyncAction,
    pub repo_name: Option<String>,
    pub summary: SyncSummary,
    pub in_progress: bool,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct SyncSummary {
    pub cloned: u32,
    pub refreshed: u32,
    pub unchanged: u32,
    pub failed: u32,
    pub files: u32,
    pub records_created: u32,
    pub records_updated: u32,
    pub records_unchanged: u32,
}

impl SyncSummary {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Cloned => self.cloned += 1,
            SyncOutcome::Refreshed { changed: true } => self.refreshed += 1,
            SyncOutcome::Refreshed { changed: false } => self.unchanged += 1,
        }
    }

    fn record_registration(&mut self, outcome: RegisterOutcome) {
        match outcome {
            RegisterOutcome::Created => self.records_created += 1,
            RegisterOutcome::Updated => self.records_updated += 1,
            RegisterOutcome::Unchanged => self.records_unchanged += 1,
        }
    }
}

/// Per-repository line of a run report.
#[derive(Clone, Debug)]
pub struct RepoReport {
    pub name: String,
    pub path: PathBuf,
    pub outcome: Option<SyncOutcome>,
    pub git_ref: Option<String>,
    pub head_commit: Option<String>,
    pub web_link: Option<String>,
    pub files: usize,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

impl RepoReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub summary: SyncSummary,
    /// One entry per configured repository, in configuration order.
    pub repos: Vec<RepoReport>,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

#[derive(Clone, Debug)]
pub struct SyncOptions {
    pub cache_root: PathBuf,
    pub jobs: usize,
    pub depth: i32,
    /// Per-repository budget, measured from when a worker picks it up.
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl SyncOptions {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            jobs: 1,
            depth: SHALLOW_DEPTH,
            timeout: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Synchronizes every repository, then registers its descriptor followed by
/// its files. A failing repository is reported and skipped; only registry
/// errors abort the run.
pub fn run_sync(
    repos: &[RepositoryConfig],
    options: &SyncOptions,
    ingestor: &dyn FileIngestor,
    registry: &mut dyn Registry,
    progress: Option<&SyncProgressReporter<'_>>,
) -> anyhow::Result<SyncReport> {
    let mut seen = HashSet::new();
    for repo in repos {
        if !seen.insert(repo.name.as_str()) {
            anyhow::bail!("repository name {} is configured more than once", repo.name);
        }
    }
    fs::create_dir_all(&options.cache_root).with_context(|| {
        format!("create cache root {}", options.cache_root.display())
    })?;

    let mut coordinator = Coordinator::new(repos, options, registry, progress);
    coordinator.emit(SyncAction::Starting, None, true);
    run_work_items(repos, options, ingestor, &mut coordinator)?;
    coordinator.emit(SyncAction::Done, None, false);

    let report = coordinator.into_report();
    let summary = report.summary;
    info!(
        cloned = summary.cloned,
        refreshed = summary.refreshed,
        unchanged = summary.unchanged,
        failed = summary.failed,
        files = summary.files,
        created = summary.records_created,
        updated = summary.records_updated,
        "sync finished"
    );
    Ok(report)
}

/// Everything a worker produced for one repository, ready to register.
pub(crate) struct RepoWork {
    synced: MirrorSync,
    descriptor: RepositoryDescriptor,
    descriptor_digest: String,
    files: Vec<(FileRecord, String)>,
}

pub(crate) fn sync_one(
    config: &RepositoryConfig,
    options: &SyncOptions,
    ingestor: &dyn FileIngestor,
) -> Result<RepoWork> {
    let cancel = options.cancel.child(options.timeout);
    let lock = MirrorLock::acquire(
        &lock_path(&options.cache_root, &config.name),
        &config.name,
        &cancel,
    )?;
    debug!(repo = %config.name, lock = %lock.path().display(), "mirror lock held");
    let synced = synchronize(config, &options.cache_root, options.depth, &cancel)?;
    let descriptor = build_descriptor(&config.name, &config.remote, &synced.resolved_ref)?
        .with_head_commit(synced.head_commit.clone());
    let descriptor_digest = descriptor.content_digest()?;
    let files = ingestor
        .ingest(&config.name, &synced.local_path, &config.patterns)?
        .into_iter()
        .map(|mut file| {
            file.git_remote = Some(descriptor.id.clone());
            let digest = content_digest(&file).map_err(|source| MirrorError::Serialize {
                name: config.name.clone(),
                source,
            })?;
            Ok((file, digest))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RepoWork {
        synced,
        descriptor,
        descriptor_digest,
        files,
    })
}

/// Owns the registry and the report; only the coordinating thread touches it.
pub(crate) struct Coordinator<'a> {
    repos: &'a [RepositoryConfig],
    options: &'a SyncOptions,
    registry: &'a mut dyn Registry,
    progress: Option<&'a SyncProgressReporter<'a>>,
    summary: SyncSummary,
    processed: usize,
    reports: Vec<Option<RepoReport>>,
}

impl<'a> Coordinator<'a> {
    fn new(
        repos: &'a [RepositoryConfig],
        options: &'a SyncOptions,
        registry: &'a mut dyn Registry,
        progress: Option<&'a SyncProgressReporter<'a>>,
    ) -> Self {
        Self {
            repos,
            options,
            registry,
            progress,
            summary: SyncSummary::default(),
            processed: 0,
            reports: vec![None; repos.len()],
        }
    }

    pub(crate) fn started(&mut self, index: usize) {
        let name = self.repos[index].name.clone();
        self.emit(SyncAction::Syncing, Some(name), true);
    }

    pub(crate) fn finished(&mut self, index: usize, result: Result<RepoWork>) -> anyhow::Result<()> {
        let repos = self.repos;
        let config = &repos[index];
        let path = mirror_path(&self.options.cache_root, &config.name);
        let (report, action) = match result {
            Ok(work) => {
                let action = SyncAction::from(work.synced.outcome);
                (self.register(config, path, work)?, action)
            }
            Err(err) => {
                self.summary.failed += 1;
                warn!(
                    repo = %config.name,
                    kind = err.kind(),
                    error = %err,
                    "repository sync failed"
                );
                let report = RepoReport {
                    name: config.name.clone(),
                    path,
                    outcome: None,
                    git_ref: None,
                    head_commit: None,
                    web_link: None,
                    files: 0,
                    error: Some(err.to_string()),
                    error_kind: Some(err.kind()),
                };
                (report, SyncAction::Failed)
            }
        };
        let name = report.name.clone();
        self.reports[index] = Some(report);
        self.processed += 1;
        self.emit(action, Some(name), true);
        Ok(())
    }

    fn register(
        &mut self,
        config: &RepositoryConfig,
        path: PathBuf,
        work: RepoWork,
    ) -> anyhow::Result<RepoReport> {
        let RepoWork {
            synced,
            descriptor,
            descriptor_digest,
            files,
        } = work;
        self.summary.record(synced.outcome);
        let web_link = descriptor.remote.web_link.clone();

        let outcome = self
            .registry
            .register(RegistryRecord::GitRemote(descriptor), &descriptor_digest)
            .with_context(|| format!("register descriptor for {}", config.name))?;
        self.summary.record_registration(outcome);

        let file_count = files.len();
        for (file, digest) in files {
            let relative = file.relative_path.clone();
            let outcome = self
                .registry
                .register(RegistryRecord::File(file), &digest)
                .with_context(|| format!("register {relative} for {}", config.name))?;
            self.summary.record_registration(outcome);
        }
        self.summary.files += u32::try_from(file_count).unwrap_or(u32::MAX);

        info!(
            repo = %config.name,
            outcome = %synced.outcome,
            git_ref = %synced.resolved_ref,
            files = file_count,
            "repository synced"
        );
        Ok(RepoReport {
            name: config.name.clone(),
            path,
            outcome: Some(synced.outcome),
            git_ref: Some(synced.resolved_ref),
            head_commit: Some(synced.head_commit),
            web_link,
            files: file_count,
            error: None,
            error_kind: None,
        })
    }

    fn emit(&self, action: SyncAction, repo_name: Option<String>, in_progress: bool) {
        if let Some(progress) = self.progress {
            progress(SyncProgress {
                total_repos: self.repos.len(),
                processed_repos: self.processed,
                action,
                repo_name,
                summary: self.summary,
                in_progress,
            });
        }
    }

    fn into_report(self) -> SyncReport {
        SyncReport {
            summary: self.summary,
            repos: self.reports.into_iter().flatten().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::descriptor_id;
    use crate::ingest::GlobIngestor;
    use crate::registry::ManifestRegistry;
    use crate::test_support::{commit_file, init_upstream, url};
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    fn upstream(root: &Path, name: &str) -> (PathBuf, git2::Repository) {
        let path = root.join(format!("upstream-{name}"));
        let repo = init_upstream(&path, "main");
        commit_file(&repo, "main", "README.md", "# docs");
        commit_file(&repo, "main", "guide/intro.md", "intro");
        commit_file(&repo, "main", "guide/image.png", "png");
        (path, repo)
    }

    fn config(name: &str, upstream: &Path) -> RepositoryConfig {
        RepositoryConfig::new(name, url(upstream)).with_patterns(["**/*.md"])
    }

    fn options(tmp: &TempDir) -> SyncOptions {
        SyncOptions::new(tmp.path().join("cache"))
    }

    fn run(
        repos: &[RepositoryConfig],
        options: &SyncOptions,
        registry: &mut ManifestRegistry,
    ) -> SyncReport {
        run_sync(repos, options, &GlobIngestor::default(), registry, None).unwrap()
    }

    #[test]
    fn registers_descriptor_and_linked_files() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let mut registry = ManifestRegistry::new();

        let report = run(&[config("docs", &upstream)], &options(&tmp), &mut registry);

        assert_eq!(report.summary.cloned, 1);
        assert_eq!(report.summary.files, 2);
        assert_eq!(report.summary.records_created, 3);
        let repo = &report.repos[0];
        assert!(repo.succeeded());
        assert_eq!(repo.git_ref.as_deref(), Some("main"));
        assert_eq!(repo.web_link, None);
        assert_eq!(repo.files, 2);

        let id = descriptor_id("docs");
        assert!(matches!(
            registry.get(&id).map(|entry| &entry.record),
            Some(RegistryRecord::GitRemote(_))
        ));
        let files: Vec<&FileRecord> = registry
            .entries()
            .filter_map(|entry| match &entry.record {
                RegistryRecord::File(file) => Some(file),
                RegistryRecord::GitRemote(_) => None,
            })
            .collect();
        assert_eq!(files.len(), 2);
        assert!(
            files
                .iter()
                .all(|file| file.git_remote.as_deref() == Some(id.as_str()))
        );
    }

    #[test]
    fn second_run_without_changes_leaves_records_unchanged() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream)];
        let options = options(&tmp);
        let mut registry = ManifestRegistry::new();

        run(&repos, &options, &mut registry);
        let second = run(&repos, &options, &mut registry);

        assert_eq!(second.summary.unchanged, 1);
        assert_eq!(second.summary.records_created, 0);
        assert_eq!(second.summary.records_updated, 0);
        assert_eq!(second.summary.records_unchanged, 3);
    }

    #[test]
    fn upstream_change_updates_records() {
        let tmp = TempDir::new().unwrap();
        let (upstream, repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream)];
        let options = options(&tmp);
        let mut registry = ManifestRegistry::new();

        run(&repos, &options, &mut registry);
        commit_file(&repo, "main", "guide/intro.md", "intro, revised");
        let second = run(&repos, &options, &mut registry);

        assert_eq!(second.summary.refreshed, 1);
        assert_eq!(second.summary.records_created, 0);
        assert!(second.summary.records_updated >= 2);
    }

    #[test]
    fn failures_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [
            config("broken", &tmp.path().join("no-such-upstream")),
            config("docs", &upstream),
        ];
        let mut registry = ManifestRegistry::new();

        let report = run(&repos, &options(&tmp).with_jobs(2), &mut registry);

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.cloned, 1);
        assert!(report.has_failures());
        assert_eq!(report.repos[0].name, "broken");
        assert_eq!(report.repos[0].error_kind, Some("clone_failure"));
        assert!(report.repos[1].succeeded());
        assert!(
            registry
                .entries()
                .all(|entry| entry.record.source_instance_name() == "docs")
        );
    }

    #[test]
    fn one_remote_under_several_names_in_parallel() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [
            config("docs-a", &upstream),
            config("docs-b", &upstream),
            config("docs-c", &upstream),
        ];
        let mut registry = ManifestRegistry::new();

        let report = run(&repos, &options(&tmp).with_jobs(3), &mut registry);

        assert_eq!(report.summary.cloned, 3);
        assert_eq!(report.summary.failed, 0);
        let paths: HashSet<&PathBuf> = report.repos.iter().map(|repo| &repo.path).collect();
        assert_eq!(paths.len(), 3);
        for name in ["docs-a", "docs-b", "docs-c"] {
            assert!(registry.get(&descriptor_id(name)).is_some());
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream), config("docs", &upstream)];
        let err = run_sync(
            &repos,
            &options(&tmp),
            &GlobIngestor::default(),
            &mut ManifestRegistry::new(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn cancelled_batch_fails_every_repo() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream), config("site", &upstream)];
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut registry = ManifestRegistry::new();

        let report = run(&repos, &options(&tmp).with_cancel(cancel), &mut registry);

        assert_eq!(report.summary.failed, 2);
        assert!(
            report
                .repos
                .iter()
                .all(|repo| repo.error_kind == Some("cancelled"))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn progress_runs_from_starting_to_done() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream), config("site", &upstream)];
        let seen = RefCell::new(Vec::new());
        let reporter: &SyncProgressReporter<'_> = &|progress| seen.borrow_mut().push(progress);

        run_sync(
            &repos,
            &options(&tmp),
            &GlobIngestor::default(),
            &mut ManifestRegistry::new(),
            Some(reporter),
        )
        .unwrap();

        let seen = seen.into_inner();
        assert_eq!(seen.first().map(|p| p.action), Some(SyncAction::Starting));
        let done = seen.last().unwrap();
        assert_eq!(done.action, SyncAction::Done);
        assert_eq!(done.processed_repos, 2);
        assert_eq!(done.total_repos, 2);
        assert!(!done.in_progress);
        assert_eq!(
            seen.iter()
                .filter(|p| p.action == SyncAction::Cloned)
                .count(),
            2
        );
    }

    struct RejectingRegistry;

    impl Registry for RejectingRegistry {
        fn register(
            &mut self,
            _record: RegistryRecord,
            _content_digest: &str,
        ) -> anyhow::Result<RegisterOutcome> {
            anyhow::bail!("registry offline")
        }
    }

    #[test]
    fn registry_errors_abort_the_run() {
        let tmp = TempDir::new().unwrap();
        let (upstream, _repo) = upstream(tmp.path(), "docs");
        let repos = [config("docs", &upstream), config("site", &upstream)];
        let err = run_sync(
            &repos,
            &options(&tmp).with_jobs(2),
            &GlobIngestor::default(),
            &mut RejectingRegistry,
            None,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("registry offline"));
    }
}
