use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Exclusive advisory lock on a workspace, held for the length of one CLI
/// command so concurrent `arb` invocations do not interleave writes to
/// `nodes.json` and `history.json`.
pub struct WorkspaceLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("workspace is busy: another arb process holds {path}")]
    Timeout { path: PathBuf },
}

impl WorkspaceLock {
    /// Wait up to `timeout` for the lock on `arbor_dir/.lock`.
    pub fn acquire(arbor_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = arbor_dir.join(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let start = Instant::now();
        while !try_lock(&file) {
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        tracing::trace!(path = %path.display(), "workspace locked");
        Ok(WorkspaceLock { _file: file, path })
    }

    pub fn acquire_default(arbor_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(arbor_dir, Duration::from_secs(5))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// The lock goes away with the file descriptor.

#[cfg(unix)]
fn try_lock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let lock = WorkspaceLock::acquire_default(tmp.path()).unwrap();
        assert!(lock.path().ends_with(".lock"));
        drop(lock);
        assert!(WorkspaceLock::acquire_default(tmp.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn lock_contention_times_out() {
        let tmp = TempDir::new().unwrap();
        let _held = WorkspaceLock::acquire_default(tmp.path()).unwrap();
        let err = WorkspaceLock::acquire(tmp.path(), Duration::from_millis(50)).err();
        assert!(matches!(err, Some(LockError::Timeout { .. })));
    }
}
