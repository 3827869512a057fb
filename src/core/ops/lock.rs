//! core::ops::lock
//!
//! Corpus-wide and per-path write locks for repairs.
//!
//! # Architecture
//!
//! Two levels of exclusion protect writes:
//!
//! - [`CorpusLock`]: an OS-level advisory lock on `<root>/.corpuscheck/lock`,
//!   held for a whole fix run so two processes never repair the same corpus
//!   at once.
//! - [`PathLocks`]: in-process mutexes keyed by path, so writers inside one
//!   run are serialized per file.
//!
//! # Invariants
//!
//! - Corpus lock acquisition is non-blocking (fails fast if locked)
//! - The corpus lock is released on drop
//! - A path mutex is created on first use and lives as long as the table
//!
//! # Example
//!
//! ```
//! use corpuscheck::core::ops::lock::CorpusLock;
//! use corpuscheck::core::paths::CorpusPaths;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let paths = CorpusPaths::new(dir.path());
//! let lock = CorpusLock::acquire(&paths).unwrap();
//! assert!(lock.is_held());
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::Mutex;
use thiserror::Error;

use crate::core::paths::CorpusPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("corpus is locked by another corpuscheck process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the corpus.
///
/// Released when dropped, even if the holder panics.
#[derive(Debug)]
pub struct CorpusLock {
    path: PathBuf,
    /// Some while the lock is held.
    file: Option<File>,
}

impl CorpusLock {
    /// Attempt to acquire the corpus lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &CorpusPaths) -> Result<Self, LockError> {
        let state_dir = paths.state_dir();
        fs::create_dir_all(&state_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", state_dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for CorpusLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

/// Mutexes keyed by path.
///
/// ```
/// use corpuscheck::core::ops::lock::PathLocks;
/// use std::path::Path;
///
/// let locks = PathLocks::default();
/// let a = locks.for_path(Path::new("1.md"));
/// let b = locks.for_path(Path::new("1.md"));
/// let _guard = a.lock();
/// assert!(b.try_lock().is_none());
/// ```
#[derive(Debug, Default)]
pub struct PathLocks {
    table: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// The mutex for `path`, created on first use.
    pub fn for_path(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut table = self.table.lock();
        Arc::clone(table.entry(path.to_path_buf()).or_default())
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod corpus_lock {
        use super::*;

        #[test]
        fn acquire_creates_state_dir() {
            let temp = TempDir::new().expect("create temp dir");
            let paths = CorpusPaths::new(temp.path());
            assert!(!paths.state_dir().exists());

            let lock = CorpusLock::acquire(&paths).expect("acquire lock");
            assert!(lock.is_held());
            assert!(paths.state_dir().exists());
            assert_eq!(lock.path(), paths.lock_path());
        }

        #[test]
        fn second_acquire_fails() {
            let temp = TempDir::new().expect("create temp dir");
            let paths = CorpusPaths::new(temp.path());

            let _lock = CorpusLock::acquire(&paths).expect("first acquire");
            let result = CorpusLock::acquire(&paths);
            assert!(matches!(result, Err(LockError::AlreadyLocked)));
        }

        #[test]
        fn released_on_drop() {
            let temp = TempDir::new().expect("create temp dir");
            let paths = CorpusPaths::new(temp.path());

            {
                let _lock = CorpusLock::acquire(&paths).expect("first acquire");
            }
            let lock = CorpusLock::acquire(&paths).expect("second acquire");
            assert!(lock.is_held());
        }

        #[test]
        fn explicit_release_is_repeatable() {
            let temp = TempDir::new().expect("create temp dir");
            let paths = CorpusPaths::new(temp.path());

            let mut lock = CorpusLock::acquire(&paths).expect("acquire");
            lock.release().expect("first release");
            lock.release().expect("second release");
            assert!(!lock.is_held());

            let again = CorpusLock::acquire(&paths).expect("reacquire");
            assert!(again.is_held());
        }
    }

    mod path_locks {
        use super::*;

        #[test]
        fn same_path_shares_mutex() {
            let locks = PathLocks::default();
            let a = locks.for_path(Path::new("a.md"));
            let b = locks.for_path(Path::new("a.md"));
            assert!(Arc::ptr_eq(&a, &b));
            assert_eq!(locks.len(), 1);
        }

        #[test]
        fn distinct_paths_do_not_block() {
            let locks = PathLocks::default();
            let a = locks.for_path(Path::new("a.md"));
            let b = locks.for_path(Path::new("b.md"));
            let _guard = a.lock();
            assert!(b.try_lock().is_some());
        }
    }
}
