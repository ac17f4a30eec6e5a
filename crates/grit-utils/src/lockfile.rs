use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Errors from the lock-file protocol.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("unable to lock {path}: lock file already exists")]
    AlreadyLocked { path: PathBuf },

    #[error("unable to create lock file {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to commit lock file {path}")]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Guard for an atomic file rewrite.
///
/// Acquiring creates `<path>.lock` with create-new semantics, so a second
/// writer fails immediately. New content is written to the lock file and
/// becomes visible only on [`commit`](LockFile::commit), which renames the
/// lock file over the target. Dropping an uncommitted guard removes the
/// lock file and leaves the target untouched.
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

const LOCK_SUFFIX: &str = ".lock";

impl LockFile {
    /// Take the lock for `target`, failing if another writer holds it.
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self, LockError> {
        let target = target.as_ref().to_path_buf();
        let mut name = target.as_os_str().to_os_string();
        name.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => LockError::AlreadyLocked {
                    path: lock_path.clone(),
                },
                _ => LockError::Create {
                    path: lock_path.clone(),
                    source: e,
                },
            })?;

        Ok(Self {
            target,
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// The file the lock protects.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The `.lock` file currently holding the new content.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Flush, sync, and atomically rename the lock file onto the target.
    pub fn commit(mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            let sync = |source| LockError::Commit {
                path: self.lock_path.clone(),
                source,
            };
            file.sync_all().map_err(sync)?;
        }
        fs::rename(&self.lock_path, &self.target).map_err(|e| LockError::Commit {
            path: self.lock_path.clone(),
            source: e,
        })?;
        self.committed = true;
        Ok(())
    }

    /// Abandon the update and remove the lock file.
    pub fn rollback(mut self) -> Result<(), LockError> {
        self.file.take();
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

impl std::fmt::Debug for LockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFile")
            .field("target", &self.target)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");
        fs::write(&target, b"before").unwrap();

        let mut lock = LockFile::acquire(&target).unwrap();
        lock.write_all(b"after").unwrap();
        lock.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"after");
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn drop_without_commit_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");
        fs::write(&target, b"before").unwrap();

        {
            let mut lock = LockFile::acquire(&target).unwrap();
            lock.write_all(b"never seen").unwrap();
        }

        assert_eq!(fs::read(&target).unwrap(), b"before");
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn second_acquire_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");

        let _held = LockFile::acquire(&target).unwrap();
        match LockFile::acquire(&target) {
            Err(LockError::AlreadyLocked { .. }) => {}
            other => panic!("expected AlreadyLocked, got {other:?}"),
        }
    }

    #[test]
    fn rollback_removes_lock() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("state");

        let mut lock = LockFile::acquire(&target).unwrap();
        lock.write_all(b"abandoned").unwrap();
        lock.rollback().unwrap();

        assert!(!target.exists());
        assert!(!dir.path().join("state.lock").exists());
    }

    #[test]
    fn creates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("fresh");

        let mut lock = LockFile::acquire(&target).unwrap();
        lock.write_all(b"first content").unwrap();
        lock.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"first content");
    }
}
