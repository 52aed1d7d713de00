//! Database directory management.
//!
//! File system layout:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK     # advisory lock for single-process access
//! └─ LOG      # commit log
//! ```
//!
//! The LOCK file ensures only one process opens the database at a time;
//! this is the same guarantee the access layer's handle rules rely on.

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the database directory.
const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "LOG";
/// Temporary file for atomic log rewrites.
const LOG_TEMP: &str = "LOG.tmp";

/// Holds the database directory and its exclusive lock.
///
/// Dropping the `EngineDir` releases the lock.
#[derive(Debug)]
pub(crate) struct EngineDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl EngineDir {
    /// Opens or creates a database directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the directory doesn't exist and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - `Locked` if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> EngineResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(EngineError::invalid_argument(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(EngineError::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the commit log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Returns the temporary path used for atomic log rewrites.
    #[must_use]
    pub fn log_temp_path(&self) -> PathBuf {
        self.path.join(LOG_TEMP)
    }

    /// Checks if this is a new (empty) database directory.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.log_path().exists()
    }

    /// Removes the engine's own files and, if then empty, the directory.
    ///
    /// Files the engine does not recognize are left in place. Consumes
    /// the handle so the lock is released before the LOCK file itself
    /// is removed.
    pub fn remove_all(self) -> EngineResult<()> {
        let path = self.path.clone();
        for name in [LOG_FILE, LOG_TEMP] {
            let file = path.join(name);
            if file.exists() {
                fs::remove_file(&file)?;
            }
        }
        drop(self);
        let lock = path.join(LOCK_FILE);
        if lock.exists() {
            fs::remove_file(&lock)?;
        }
        // Leave the directory behind if unknown files remain in it.
        let _ = fs::remove_dir(&path);
        Ok(())
    }

    /// Syncs the database directory so metadata updates are durable.
    ///
    /// Needed after renames: the directory entry itself must reach disk
    /// before the rewrite is crash-safe.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> EngineResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> EngineResult<()> {
        // Windows NTFS journaling covers metadata durability; directory
        // fsync is not supported there.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("new_db");

        assert!(!db_path.exists());
        let dir = EngineDir::open(&db_path, true).unwrap();
        assert!(db_path.is_dir());
        assert!(dir.is_new_database());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("nonexistent");

        let result = EngineDir::open(&db_path, false);
        assert!(matches!(result, Err(EngineError::InvalidArgument { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("locked_db");

        let _dir1 = EngineDir::open(&db_path, true).unwrap();
        let result = EngineDir::open(&db_path, true);
        assert!(matches!(result, Err(EngineError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("reopen_db");

        {
            let _dir = EngineDir::open(&db_path, true).unwrap();
        }
        let _dir2 = EngineDir::open(&db_path, true).unwrap();
    }

    #[test]
    fn remove_all_deletes_known_files() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("doomed_db");

        let dir = EngineDir::open(&db_path, true).unwrap();
        std::fs::write(dir.log_path(), b"data").unwrap();
        dir.remove_all().unwrap();

        assert!(!db_path.exists());
    }
}
