use crate::cancel::CancelToken;
use crate::error::{MirrorError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on one mirror directory, released on drop.
#[derive(Debug)]
pub struct MirrorLock {
    path: PathBuf,
    file: File,
}

impl MirrorLock {
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
            })),
            Err(err) if is_lock_held(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Waits for the lock, giving up when `cancel` is interrupted.
    pub fn acquire(path: &Path, name: &str, cancel: &CancelToken) -> Result<Self> {
        let mut waited = false;
        loop {
            let attempt = Self::try_acquire(path).map_err(|source| MirrorError::Lock {
                name: name.to_string(),
                source,
            })?;
            if let Some(lock) = attempt {
                return Ok(lock);
            }
            if let Some(interrupt) = cancel.interrupt() {
                return Err(MirrorError::interrupted(name, interrupt));
            }
            if !waited {
                debug!(repo = %name, lock = %path.display(), "waiting for mirror lock");
                waited = true;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MirrorLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_lock_held(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    matches!(err.raw_os_error(), Some(33))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_prevents_double_lock() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join(".locks").join("docs.lock");
        let first = MirrorLock::try_acquire(&lock_path).unwrap();
        assert!(first.is_some());
        let second = MirrorLock::try_acquire(&lock_path).unwrap();
        assert!(second.is_none());
        drop(first);
        assert!(MirrorLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn acquire_gives_up_when_cancelled() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("docs.lock");
        let _held = MirrorLock::try_acquire(&lock_path).unwrap().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = MirrorLock::acquire(&lock_path, "docs", &cancel).unwrap_err();
        assert_eq!(err.kind(), "cancelled");
    }

    #[test]
    fn acquire_times_out_while_held() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("docs.lock");
        let _held = MirrorLock::try_acquire(&lock_path).unwrap().unwrap();
        let cancel = CancelToken::new().child(Some(Duration::from_millis(250)));
        let err = MirrorLock::acquire(&lock_path, "docs", &cancel).unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn acquire_waits_for_release() {
        let tmp = TempDir::new().unwrap();
        let lock_path = tmp.path().join("docs.lock");
        let held = MirrorLock::try_acquire(&lock_path).unwrap().unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            drop(held);
        });
        let lock = MirrorLock::acquire(&lock_path, "docs", &CancelToken::new()).unwrap();
        assert_eq!(lock.path(), lock_path.as_path());
        releaser.join().unwrap();
    }
}
