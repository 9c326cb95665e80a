use crate::cancel::CancelToken;
use crate::error::{MirrorError, Result};
use crate::model::{MirrorState, MirrorStatus, MirrorSync, RepositoryConfig, SyncOutcome};
use crate::paths::mirror_path;
use crate::remote_url::RemoteUrl;
use git2::{
    AutotagOption, Cred, CredentialType, Direction, FetchOptions, Oid, RemoteCallbacks,
    Repository, ResetType,
    build::{CheckoutBuilder, RepoBuilder},
};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// History depth for clones and refreshes. Zero means unlimited.
/// Local remotes always transfer full history.
pub const SHALLOW_DEPTH: i32 = 1;

const ORIGIN: &str = "origin";
const ORIGIN_HEAD: &str = "refs/remotes/origin/HEAD";
const ORIGIN_PREFIX: &str = "refs/remotes/origin/";
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Brings the mirror for `config` under `cache_root` up to date.
///
/// A missing or empty directory is cloned. A directory whose `origin`
/// matches the configured remote is fetched and hard reset to the target
/// branch. Anything else is reported as drift and left untouched.
pub fn synchronize(
    config: &RepositoryConfig,
    cache_root: &Path,
    depth: i32,
    cancel: &CancelToken,
) -> Result<MirrorSync> {
    let path = mirror_path(cache_root, &config.name);
    check_interrupt(config, cancel)?;

    let state = inspect_mirror(&path)?;
    debug!(repo = %config.name, path = %path.display(), state = state.as_str(), "inspected mirror");
    let depth = transfer_depth(&config.remote, depth);
    let (repo, outcome) = if state.needs_clone() {
        let repo = clone_repo(config, &path, depth, cancel)?;
        (repo, SyncOutcome::Cloned)
    } else {
        match state {
            MirrorState::Mirror { remote } if remote.trim() == config.remote.trim() => {
                let repo = Repository::open(&path)
                    .map_err(|source| refresh_error(config, "open", source))?;
                let changed = refresh_repo(config, &repo, depth, cancel)?;
                (repo, SyncOutcome::Refreshed { changed })
            }
            MirrorState::Mirror { remote } => return Err(drift(config, &path, Some(remote))),
            _ => return Err(drift(config, &path, None)),
        }
    };

    check_interrupt(config, cancel)?;
    let resolved_ref = read_checked_out_ref(config, &repo)?;
    let head_commit = read_head_commit(&repo).map_err(|err| MirrorError::BranchResolution {
        name: config.name.clone(),
        reason: format!("cannot read HEAD commit: {err}"),
    })?;
    info!(
        repo = %config.name,
        path = %path.display(),
        git_ref = %resolved_ref,
        head = %head_commit,
        outcome = %outcome,
        "mirror synchronized"
    );
    Ok(MirrorSync {
        local_path: path,
        resolved_ref,
        head_commit,
        outcome,
    })
}

/// Classifies what currently sits at a mirror path. Never touches the network.
pub fn inspect_mirror(path: &Path) -> Result<MirrorState> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(MirrorState::Missing),
        Err(err) => return Err(MirrorError::io(path, err)),
    };
    if !metadata.is_dir() {
        return Ok(MirrorState::Foreign);
    }
    let mut entries = fs::read_dir(path).map_err(|err| MirrorError::io(path, err))?;
    if entries.next().is_none() {
        return Ok(MirrorState::Empty);
    }
    let Ok(repo) = Repository::open(path) else {
        return Ok(MirrorState::Foreign);
    };
    let remote = repo
        .find_remote(ORIGIN)
        .ok()
        .and_then(|remote| remote.url().map(str::to_string));
    Ok(match remote {
        Some(remote) => MirrorState::Mirror { remote },
        None => MirrorState::Foreign,
    })
}

/// Offline status of a mirror: its state plus checked-out branch and head.
pub fn mirror_status(path: &Path) -> Result<MirrorStatus> {
    let state = inspect_mirror(path)?;
    let (branch, head_commit) = match state {
        MirrorState::Mirror { .. } => match Repository::open(path) {
            Ok(repo) => (checked_out_branch(&repo), read_head_commit(&repo).ok()),
            Err(_) => (None, None),
        },
        _ => (None, None),
    };
    Ok(MirrorStatus {
        path: path.to_path_buf(),
        state,
        branch,
        head_commit,
    })
}

/// libgit2's local transport rejects shallow fetches, so bare paths and
/// `file://` remotes fall back to full history. Unparseable remotes keep
/// the requested depth and fail later with their own error.
fn transfer_depth(remote: &str, depth: i32) -> i32 {
    match RemoteUrl::parse(remote) {
        Ok(parsed) if parsed.protocol == "file" && depth != 0 => {
            debug!(remote = %remote, depth, "local remote; fetching full history");
            0
        }
        _ => depth,
    }
}

fn clone_repo(
    config: &RepositoryConfig,
    path: &Path,
    depth: i32,
    cancel: &CancelToken,
) -> Result<Repository> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| MirrorError::io(parent, err))?;
    }
    info!(
        repo = %config.name,
        path = %path.display(),
        branch = config.branch.as_deref().unwrap_or("<remote default>"),
        "cloning mirror"
    );
    let mut builder = RepoBuilder::new();
    if let Some(branch) = config.branch.as_deref() {
        builder.branch(branch);
    }
    builder.fetch_options(fetch_options(cancel, depth));
    builder.clone(&config.remote, path).map_err(|source| {
        interrupted(config, cancel).unwrap_or_else(|| MirrorError::Clone {
            name: config.name.clone(),
            remote: config.remote.clone(),
            source,
        })
    })
}

/// Fetch first, reset only after the fetch succeeded, so a failed fetch
/// leaves the previous checkout intact. Returns whether HEAD moved.
fn refresh_repo(
    config: &RepositoryConfig,
    repo: &Repository,
    depth: i32,
    cancel: &CancelToken,
) -> Result<bool> {
    let previous = repo.head().ok().and_then(|head| head.target());
    let branch = resolve_target_branch(config, repo, cancel)?;
    check_interrupt(config, cancel)?;
    fetch_branch(config, repo, &branch, depth, cancel)?;
    check_interrupt(config, cancel)?;
    let target = reset_to_branch(config, repo, &branch)?;
    Ok(previous != Some(target))
}

fn resolve_target_branch(
    config: &RepositoryConfig,
    repo: &Repository,
    cancel: &CancelToken,
) -> Result<String> {
    if let Some(branch) = config.branch.as_deref() {
        return Ok(branch.to_string());
    }
    if let Some(branch) = origin_head_branch(repo) {
        return Ok(branch);
    }
    debug!(repo = %config.name, "origin HEAD not recorded; asking remote for its default branch");
    let branch = remote_default_branch(config, repo, cancel)?;
    let target = format!("{ORIGIN_PREFIX}{branch}");
    if let Err(err) = repo.reference_symbolic(ORIGIN_HEAD, &target, true, "record remote HEAD") {
        warn!(repo = %config.name, error = %err, "could not record origin HEAD");
    }
    Ok(branch)
}

fn origin_head_branch(repo: &Repository) -> Option<String> {
    let reference = repo.find_reference(ORIGIN_HEAD).ok()?;
    let target = reference.symbolic_target()?;
    target
        .strip_prefix(ORIGIN_PREFIX)
        .filter(|branch| !branch.is_empty() && *branch != "HEAD")
        .map(str::to_string)
}

fn remote_default_branch(
    config: &RepositoryConfig,
    repo: &Repository,
    cancel: &CancelToken,
) -> Result<String> {
    let branch_error = |reason: String| MirrorError::BranchResolution {
        name: config.name.clone(),
        reason,
    };
    let mut remote = repo
        .find_remote(ORIGIN)
        .map_err(|err| branch_error(format!("no origin remote: {err}")))?;
    let connection = remote
        .connect_auth(Direction::Fetch, Some(remote_callbacks(cancel)), None)
        .map_err(|source| {
            interrupted(config, cancel).unwrap_or_else(|| refresh_error(config, "connect", source))
        })?;
    let default = connection
        .default_branch()
        .map_err(|err| branch_error(format!("remote did not report a default branch: {err}")))?;
    let default = default
        .as_str()
        .ok_or_else(|| branch_error("remote default branch is not valid utf-8".to_string()))?;
    default
        .strip_prefix("refs/heads/")
        .map(str::to_string)
        .ok_or_else(|| branch_error(format!("remote HEAD points at {default}")))
}

fn fetch_branch(
    config: &RepositoryConfig,
    repo: &Repository,
    branch: &str,
    depth: i32,
    cancel: &CancelToken,
) -> Result<()> {
    let mut remote = repo
        .find_remote(ORIGIN)
        .map_err(|source| refresh_error(config, "find origin", source))?;
    let refspec = format!("+refs/heads/{branch}:{ORIGIN_PREFIX}{branch}");
    let mut fo = fetch_options(cancel, depth);
    info!(repo = %config.name, branch = %branch, "fetching mirror");
    remote
        .fetch(&[refspec.as_str()], Some(&mut fo), None)
        .map_err(|source| {
            interrupted(config, cancel).unwrap_or_else(|| refresh_error(config, "fetch", source))
        })
}

/// Points HEAD at the local `branch`, moved to the fetched commit, and
/// discards any working tree changes.
fn reset_to_branch(config: &RepositoryConfig, repo: &Repository, branch: &str) -> Result<Oid> {
    let remote_ref = format!("{ORIGIN_PREFIX}{branch}");
    let target = repo
        .refname_to_id(&remote_ref)
        .map_err(|source| refresh_error(config, "resolve fetched branch", source))?;
    let commit = repo
        .find_commit(target)
        .map_err(|source| refresh_error(config, "find fetched commit", source))?;

    if checked_out_branch(repo).as_deref() != Some(branch) {
        debug!(repo = %config.name, branch = %branch, "switching mirror branch");
        repo.branch(branch, &commit, true)
            .map_err(|source| refresh_error(config, "create branch", source))?;
        repo.set_head(&format!("refs/heads/{branch}"))
            .map_err(|source| refresh_error(config, "switch branch", source))?;
    }

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.reset(commit.as_object(), ResetType::Hard, Some(&mut checkout))
        .map_err(|source| refresh_error(config, "reset", source))?;
    Ok(target)
}

fn read_checked_out_ref(config: &RepositoryConfig, repo: &Repository) -> Result<String> {
    if let Some(branch) = checked_out_branch(repo) {
        return Ok(branch);
    }
    config
        .branch
        .clone()
        .ok_or_else(|| MirrorError::BranchResolution {
            name: config.name.clone(),
            reason: "HEAD is detached and no branch is configured".to_string(),
        })
}

fn checked_out_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand()
        .filter(|name| *name != "HEAD")
        .map(str::to_string)
}

fn read_head_commit(repo: &Repository) -> std::result::Result<String, git2::Error> {
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}

fn fetch_options(cancel: &CancelToken, depth: i32) -> FetchOptions<'static> {
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(remote_callbacks(cancel));
    fo.download_tags(AutotagOption::None);
    fo.depth(depth);
    fo
}

/// Transfer callbacks abort the operation as soon as the token is
/// interrupted; libgit2 then fails the call with a user error.
fn remote_callbacks(cancel: &CancelToken) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let transfer_token = cancel.clone();
    callbacks.transfer_progress(move |_progress| !transfer_token.is_interrupted());
    let sideband_token = cancel.clone();
    callbacks.sideband_progress(move |_data| !sideband_token.is_interrupted());
    let mut attempts = 0usize;
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("remote rejected the available credentials"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            return Cred::credential_helper(&config, url, username_from_url);
        }
        Cred::default()
    });
    callbacks
}

fn check_interrupt(config: &RepositoryConfig, cancel: &CancelToken) -> Result<()> {
    match interrupted(config, cancel) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn interrupted(config: &RepositoryConfig, cancel: &CancelToken) -> Option<MirrorError> {
    cancel
        .interrupt()
        .map(|interrupt| MirrorError::interrupted(&config.name, interrupt))
}

fn refresh_error(config: &RepositoryConfig, step: &'static str, source: git2::Error) -> MirrorError {
    MirrorError::Refresh {
        name: config.name.clone(),
        step,
        source,
    }
}

fn drift(config: &RepositoryConfig, path: &Path, found: Option<String>) -> MirrorError {
    warn!(
        repo = %config.name,
        path = %path.display(),
        expected = %config.remote,
        found = found.as_deref().unwrap_or("<none>"),
        "mirror path belongs to a different remote"
    );
    MirrorError::ConfigurationDrift {
        name: config.name.clone(),
        path: path.to_path_buf(),
        expected: config.remote.clone(),
        found,
    }
}
