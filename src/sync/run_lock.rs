//! Per-base-path exclusive lock serializing coordinator runs.
//!
//! Uses `fs2` advisory locks on a file under the app directory. The lock is
//! released when the guard is dropped (closing the file releases it).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, info};

use crate::app_dirs::{self, AppDirError};

/// Errors from run lock operations.
#[derive(Debug, Error)]
pub enum RunLockError {
    #[error("Another run holds the lock for {0}")]
    Locked(PathBuf),
    #[error("Failed to open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Failed to acquire lock {path}: {source}")]
    Acquire { path: PathBuf, source: io::Error },
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

/// Held while a run owns a base path.
pub struct RunLock {
    _file: File,
    lock_path: PathBuf,
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        debug!(lock = %self.lock_path.display(), "Releasing run lock");
    }
}

impl RunLock {
    /// Lock `base` using the app directory's lock folder, waiting if needed.
    pub fn acquire(base: &Path) -> Result<Self, RunLockError> {
        Self::acquire_in(&app_dirs::locks_dir()?, base)
    }

    /// Lock `base` with the lock file kept in `lock_dir`, waiting if needed.
    pub fn acquire_in(lock_dir: &Path, base: &Path) -> Result<Self, RunLockError> {
        match Self::try_acquire_in(lock_dir, base) {
            Err(RunLockError::Locked(_)) => {}
            other => return other,
        }
        let lock_path = lock_path_for(lock_dir, base);
        info!(base = %base.display(), "Another run is active for this folder; waiting");
        let file = open_lock_file(&lock_path)?;
        FileExt::lock_exclusive(&file).map_err(|source| RunLockError::Acquire {
            path: lock_path.clone(),
            source,
        })?;
        info!(lock = %lock_path.display(), "Acquired run lock");
        Ok(Self {
            _file: file,
            lock_path,
        })
    }

    /// Lock `base` without waiting; `Locked` if another run holds it.
    pub fn try_acquire_in(lock_dir: &Path, base: &Path) -> Result<Self, RunLockError> {
        let lock_path = lock_path_for(lock_dir, base);
        let file = open_lock_file(&lock_path)?;
        // fs2's method, not the std one with a different error type.
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(lock = %lock_path.display(), "Acquired run lock");
                Ok(Self {
                    _file: file,
                    lock_path,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                Err(RunLockError::Locked(base.to_path_buf()))
            }
            Err(source) => Err(RunLockError::Acquire {
                path: lock_path,
                source,
            }),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// Lock file for `base`: a short digest of its canonical path.
pub(crate) fn lock_path_for(lock_dir: &Path, base: &Path) -> PathBuf {
    let canonical = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let digest = blake3::hash(canonical.to_string_lossy().as_bytes()).to_hex();
    lock_dir.join(format!("run-{}.lock", &digest[..16]))
}

fn open_lock_file(path: &Path) -> Result<File, RunLockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| RunLockError::Open {
            path: path.to_path_buf(),
            source,
        })
}
