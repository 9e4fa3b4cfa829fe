//! Single-writer guard for the data directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use tracing::debug;

/// Exclusive lock on a file in the data directory. The caches rewrite whole
/// files, so only one process may have them open; the lock is released when
/// this value is dropped or the process exits.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    /// Takes the lock at `path` or fails at once if another holder has it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        if let Err(e) = file.try_lock_exclusive() {
            bail!(
                "another earnmeter process is using {} ({e})",
                path.parent().unwrap_or(path).display()
            );
        }
        debug!(path = %path.display(), "Data directory locked");

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".earnmeter.lock");

        let first = StoreLock::acquire(&path).unwrap();
        let err = StoreLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("another earnmeter process"));

        drop(first);
        let again = StoreLock::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".earnmeter.lock");

        StoreLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
