use crate::cancel::Interrupt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

/// Per-repository failure kinds. None of these abort a batch; the engine
/// reports them and moves on to the next repository.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Initial clone failed (network, auth, disk).
    #[error("clone of {name} from {remote} failed: {source}")]
    Clone {
        name: String,
        remote: String,
        #[source]
        source: git2::Error,
    },

    /// The directory at the mirror path belongs to something else.
    #[error(
        "cannot mirror {name} into {}: expected remote {expected}, found {}",
        path.display(),
        found.as_deref().unwrap_or("no git remote")
    )]
    ConfigurationDrift {
        name: String,
        path: PathBuf,
        expected: String,
        found: Option<String>,
    },

    /// Fetch, reset, or checkout on an existing mirror failed.
    #[error("refresh of {name} failed during {step}: {source}")]
    Refresh {
        name: String,
        step: &'static str,
        #[source]
        source: git2::Error,
    },

    #[error("cannot resolve branch for {name}: {reason}")]
    BranchResolution { name: String, reason: String },

    #[error("invalid remote url {url:?}: {reason}")]
    Parse { url: String, reason: String },

    #[error("sync of {name} was cancelled")]
    Cancelled { name: String },

    #[error("sync of {name} timed out")]
    Timeout { name: String },

    #[error("cannot lock mirror {name}: {source}")]
    Lock {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file ingestion for {name} failed: {reason}")]
    Ingest { name: String, reason: String },

    #[error("bad file pattern {pattern:?} for {name}: {source}")]
    Pattern {
        name: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot walk mirror {name}: {source}")]
    Walk {
        name: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot serialize record for {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    /// Short stable label used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorError::Clone { .. } => "clone_failure",
            MirrorError::ConfigurationDrift { .. } => "configuration_drift",
            MirrorError::Refresh { .. } => "refresh_failure",
            MirrorError::BranchResolution { .. } => "branch_resolution_failure",
            MirrorError::Parse { .. } => "parse_failure",
            MirrorError::Cancelled { .. } => "cancelled",
            MirrorError::Timeout { .. } => "timeout",
            MirrorError::Lock { .. } => "lock_failure",
            MirrorError::Ingest { .. }
            | MirrorError::Pattern { .. }
            | MirrorError::Walk { .. } => "ingest_failure",
            MirrorError::Serialize { .. } => "serialize_failure",
            MirrorError::Io { .. } => "io_failure",
        }
    }

    pub(crate) fn interrupted(name: &str, interrupt: Interrupt) -> Self {
        let name = name.to_string();
        match interrupt {
            Interrupt::Cancelled => MirrorError::Cancelled { name },
            Interrupt::TimedOut => MirrorError::Timeout { name },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_message_names_both_remotes() {
        let err = MirrorError::ConfigurationDrift {
            name: "docs".into(),
            path: PathBuf::from("/cache/docs"),
            expected: "https://example.com/new.git".into(),
            found: Some("https://example.com/old.git".into()),
        };
        let message = err.to_string();
        assert!(message.contains("docs"));
        assert!(message.contains("https://example.com/new.git"));
        assert!(message.contains("https://example.com/old.git"));
        assert_eq!(err.kind(), "configuration_drift");
    }

    #[test]
    fn drift_without_remote_says_so() {
        let err = MirrorError::ConfigurationDrift {
            name: "docs".into(),
            path: PathBuf::from("/cache/docs"),
            expected: "https://example.com/docs.git".into(),
            found: None,
        };
        assert!(err.to_string().contains("no git remote"));
    }

    #[test]
    fn pattern_error_keeps_its_cause() {
        let source = globset::Glob::new("[*.md").unwrap_err();
        let err = MirrorError::Pattern {
            name: "docs".into(),
            pattern: "[*.md".into(),
            source,
        };
        assert_eq!(err.kind(), "ingest_failure");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("[*.md"));
    }
}
