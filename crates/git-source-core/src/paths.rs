use std::path::{Path, PathBuf};

const LOCK_DIR: &str = ".locks";

pub fn mirror_path(cache_root: &Path, name: &str) -> PathBuf {
    cache_root.join(name)
}

pub fn lock_path(cache_root: &Path, name: &str) -> PathBuf {
    cache_root.join(LOCK_DIR).join(format!("{name}.lock"))
}

/// Mirror names become a single path segment under the cache root, so they
/// must not escape it or collide with the lock directory.
pub fn validate_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty() {
        anyhow::bail!("repository name must not be empty");
    }
    if name.starts_with('.') {
        anyhow::bail!("repository name {name:?} must not start with '.'");
    }
    if name.ends_with('.') || name.ends_with(' ') {
        anyhow::bail!("repository name {name:?} must not end with '.' or a space");
    }
    if let Some(ch) = name.chars().find(|ch| is_reserved(*ch)) {
        anyhow::bail!("repository name {name:?} contains reserved character {ch:?}");
    }
    Ok(())
}

fn is_reserved(ch: char) -> bool {
    matches!(
        ch,
        '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'
    ) || ch.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_path_is_one_segment_under_root() {
        let path = mirror_path(Path::new("/tmp/cache"), "docs");
        assert_eq!(path, PathBuf::from("/tmp/cache").join("docs"));
    }

    #[test]
    fn lock_path_lives_in_lock_dir() {
        let path = lock_path(Path::new("/tmp/cache"), "docs");
        assert_eq!(
            path,
            PathBuf::from("/tmp/cache").join(".locks").join("docs.lock")
        );
    }

    #[test]
    fn accepts_ordinary_names() {
        for name in ["docs", "my-repo", "repo_2", "Site Content", "v1.2"] {
            validate_name(name).unwrap();
        }
    }

    #[test]
    fn rejects_unsafe_names() {
        for name in [
            "", ".", "..", ".locks", "a/b", "a\\b", "bad:name", "what?", "trail.",
            "trail ", "tab\tname",
        ] {
            assert!(validate_name(name).is_err(), "{name:?} should be rejected");
        }
    }
}
