//! Per-pass exclusive lock. Both archive passes mutate the filesystem
//! non-transactionally, so two invocations of the same pass must never
//! overlap; a held lock skips the pass instead of aborting the process.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct PassLock {
    file: File,
    path: PathBuf,
}

impl PassLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Try to take the lock for `pass`. `Ok(None)` means another invocation
/// holds it and the caller should skip this cycle.
pub fn acquire(state_dir: &Path, pass: &str) -> Result<Option<PassLock>> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create {}", state_dir.display()))?;
    let path = state_dir.join(format!("{pass}.lock"));
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(PassLock { file, path })),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_of_same_pass_is_refused() {
        let tmp = tempdir().expect("tempdir");

        let first = acquire(tmp.path(), "archive").expect("acquire");
        assert!(first.is_some());

        let second = acquire(tmp.path(), "archive").expect("acquire");
        assert!(second.is_none());
    }

    #[test]
    fn distinct_passes_do_not_contend() {
        let tmp = tempdir().expect("tempdir");

        let archive = acquire(tmp.path(), "archive").expect("acquire");
        let mapping = acquire(tmp.path(), "mapping").expect("acquire");
        assert!(archive.is_some());
        assert!(mapping.is_some());
    }

    #[test]
    fn dropping_the_lock_releases_it() {
        let tmp = tempdir().expect("tempdir");

        let first = acquire(tmp.path(), "archive").expect("acquire");
        drop(first);

        let second = acquire(tmp.path(), "archive").expect("acquire");
        assert!(second.is_some());
    }
}
