use super::shared::{describe_state, format_repo_report, render_progress_bar};
use super::*;
use git_source_core::model::{RepositoryConfig, SyncOutcome};
use tempfile::TempDir;

#[test]
fn sync_parses_repeated_repo_filters() {
    let cli = Cli::try_parse_from([
        "git-source",
        "--cache-root",
        "/tmp/mirrors",
        "sync",
        "--repo",
        "docs",
        "--repo",
        "site",
        "--jobs",
        "2",
        "--timeout-secs",
        "60",
    ])
    .unwrap();
    assert_eq!(cli.cache_root, Some(PathBuf::from("/tmp/mirrors")));
    match cli.command {
        Commands::Sync(args) => {
            assert_eq!(args.repo, vec!["docs", "site"]);
            assert_eq!(args.jobs, Some(2));
            assert_eq!(args.timeout_secs, Some(60));
            assert!(!args.include_dotfiles);
            assert!(args.manifest.is_none());
            assert_eq!(args.depth, SHALLOW_DEPTH);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn sync_depth_flag_overrides_default() {
    let cli = Cli::try_parse_from(["git-source", "sync", "--depth", "0"]).unwrap();
    match cli.command {
        Commands::Sync(args) => assert_eq!(args.depth, 0),
        _ => panic!("expected sync command"),
    }
}

#[test]
fn global_config_flag_after_subcommand() {
    let cli = Cli::try_parse_from(["git-source", "status", "--config", "/etc/gs.json"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("/etc/gs.json")));
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn describe_defaults() {
    let cli = Cli::try_parse_from(["git-source", "describe", "git@github.com:acme/docs.git"])
        .unwrap();
    match cli.command {
        Commands::Describe(args) => {
            assert_eq!(args.remote, "git@github.com:acme/docs.git");
            assert_eq!(args.git_ref, "main");
            assert!(args.name.is_none());
        }
        _ => panic!("expected describe command"),
    }
}

#[test]
fn describe_accepts_ref_and_name() {
    let cli = Cli::try_parse_from([
        "git-source",
        "describe",
        "https://github.com/acme/docs.git",
        "--ref",
        "release",
        "--name",
        "handbook",
    ])
    .unwrap();
    match cli.command {
        Commands::Describe(args) => {
            assert_eq!(args.git_ref, "release");
            assert_eq!(args.name.as_deref(), Some("handbook"));
        }
        _ => panic!("expected describe command"),
    }
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["git-source"]).is_err());
}

#[test]
fn command_labels() {
    let cli = Cli::try_parse_from(["git-source", "validate"]).unwrap();
    assert_eq!(command_label(&cli.command), "validate");
}

#[test]
fn cache_root_flag_overrides_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config.json");
    AppConfig {
        cache_root: Some(tmp.path().join("from-config")),
        ..AppConfig::default()
    }
    .save(&config_path)
    .unwrap();

    let context = CliContext::load(Some(config_path.clone()), None).unwrap();
    assert_eq!(context.cache_root().unwrap(), tmp.path().join("from-config"));

    let context = CliContext::load(Some(config_path), Some(tmp.path().join("flag"))).unwrap();
    assert_eq!(context.cache_root().unwrap(), tmp.path().join("flag"));
}

#[test]
fn repo_report_lines() {
    let ok = RepoReport {
        name: "docs".to_string(),
        path: PathBuf::from("/cache/docs"),
        outcome: Some(SyncOutcome::Cloned),
        git_ref: Some("main".to_string()),
        head_commit: Some("abc".to_string()),
        web_link: Some("https://github.com/acme/docs".to_string()),
        files: 3,
        error: None,
        error_kind: None,
    };
    assert_eq!(
        format_repo_report(&ok),
        "docs cloned ref=main files=3 web=https://github.com/acme/docs"
    );

    let failed = RepoReport {
        outcome: None,
        git_ref: None,
        web_link: None,
        files: 0,
        error: Some("clone of docs failed".to_string()),
        error_kind: Some("clone_failure"),
        ..ok
    };
    assert_eq!(
        format_repo_report(&failed),
        "docs failed kind=clone_failure error=clone of docs failed"
    );
}

#[test]
fn status_state_flags_drift() {
    let repo = RepositoryConfig::new("docs", "https://github.com/acme/docs.git");
    let same = MirrorState::Mirror {
        remote: "https://github.com/acme/docs.git\n".to_string(),
    };
    let other = MirrorState::Mirror {
        remote: "https://github.com/acme/old.git".to_string(),
    };
    assert_eq!(describe_state(&same, &repo.remote), "ok");
    assert!(describe_state(&other, &repo.remote).starts_with("drift"));
    assert!(describe_state(&MirrorState::Foreign, &repo.remote).starts_with("drift"));
    assert_eq!(describe_state(&MirrorState::Missing, &repo.remote), "missing");
}

#[test]
fn progress_bar_fills_proportionally() {
    assert_eq!(render_progress_bar(0, 0, 4), "[----]");
    assert_eq!(render_progress_bar(1, 2, 4), "[##--]");
    assert_eq!(render_progress_bar(2, 2, 4), "[####]");
}
