use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub remote: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub patterns: Vec<String>,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: remote.into(),
            branch: None,
            patterns: vec!["**/*".to_string()],
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Cloned,
    Refreshed { changed: bool },
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Cloned => "cloned",
            SyncOutcome::Refreshed { changed: true } => "refreshed",
            SyncOutcome::Refreshed { changed: false } => "unchanged",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful `synchronize` call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MirrorSync {
    pub local_path: PathBuf,
    pub resolved_ref: String,
    pub head_commit: String,
    pub outcome: SyncOutcome,
}

/// What the engine finds at a mirror path before deciding what to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MirrorState {
    Missing,
    Empty,
    /// A git repository with an `origin` remote.
    Mirror { remote: String },
    /// A file, a non-repository directory, or a repository without `origin`.
    Foreign,
}

impl MirrorState {
    pub fn needs_clone(&self) -> bool {
        matches!(self, MirrorState::Missing | MirrorState::Empty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorState::Missing => "missing",
            MirrorState::Empty => "empty",
            MirrorState::Mirror { .. } => "mirror",
            MirrorState::Foreign => "foreign",
        }
    }
}

/// Offline view of a mirror path, for status reporting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MirrorStatus {
    pub path: PathBuf,
    pub state: MirrorState,
    pub branch: Option<String>,
    pub head_commit: Option<String>,
}
