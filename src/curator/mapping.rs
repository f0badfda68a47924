//! Pointer-tree mapping sync. The source tree holds `.strm` pointer
//! files laid out as a plain mirror; the destination expands each
//! pointer into its own directory named after the file stem, which is
//! the layout the media server indexes. Sync is one-way and
//! mtime-driven: newer sources are re-copied, orphaned destinations are
//! removed, and emptied directories are pruned bottom-up.

use crate::curator::fsops::modified_epoch_secs;
use crate::error::{CuratorError, SkipCode};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const POINTER_SUFFIX: &str = "strm";

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncOutcome {
    pub files_examined: usize,
    pub files_written: usize,
    pub files_deleted: usize,
    pub dirs_removed: usize,
    pub errors: usize,
}

pub fn is_pointer(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(POINTER_SUFFIX))
}

/// Destination for a pointer at `rel` under the source root: the file
/// moves into a directory named after its stem, so `aa/bb/cc.strm`
/// expands to `aa/bb/cc/cc.strm`.
pub fn expanded_destination(dst_root: &Path, rel: &Path) -> Option<PathBuf> {
    let stem = rel.file_stem()?.to_str()?;
    let name = rel.file_name()?;
    let parent = rel.parent().unwrap_or_else(|| Path::new(""));
    Some(dst_root.join(parent).join(stem).join(name))
}

/// Inverse of [`expanded_destination`]: the source a destination pointer
/// must have come from, or `None` if the path does not have the expanded
/// shape (such files are foreign and left alone).
fn source_for(src_root: &Path, dst_rel: &Path) -> Option<PathBuf> {
    let stem = dst_rel.file_stem()?.to_str()?;
    let name = dst_rel.file_name()?;
    let parent = dst_rel.parent()?;
    if parent.file_name()?.to_str()? != stem {
        return None;
    }
    let grandparent = parent.parent().unwrap_or_else(|| Path::new(""));
    Some(src_root.join(grandparent).join(name))
}

/// Copy new and newer pointers from source to destination.
fn update(src_root: &Path, dst_root: &Path, outcome: &mut SyncOutcome) {
    for entry in WalkDir::new(src_root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_pointer(path) {
            continue;
        }
        outcome.files_examined += 1;
        let Ok(rel) = path.strip_prefix(src_root) else {
            continue;
        };
        let Some(dst) = expanded_destination(dst_root, rel) else {
            continue;
        };

        let src_mtime = modified_epoch_secs(path).unwrap_or(0);
        let dst_mtime = modified_epoch_secs(&dst);
        if dst_mtime.is_ok_and(|t| t >= src_mtime) {
            debug!(pointer = %rel.display(), "up to date");
            continue;
        }

        let result = dst
            .parent()
            .map(fs::create_dir_all)
            .transpose()
            .and_then(|_| fs::copy(path, &dst));
        match result {
            Ok(_) => {
                info!(from = %rel.display(), to = %dst.display(), "pointer written");
                outcome.files_written += 1;
            }
            Err(err) => {
                warn!(
                    code = SkipCode::FilesystemIo.as_str(),
                    pointer = %rel.display(),
                    error = %err,
                    "pointer copy failed"
                );
                outcome.errors += 1;
            }
        }
    }
}

/// Remove destination pointers whose source no longer exists.
fn delete_orphans(src_root: &Path, dst_root: &Path, outcome: &mut SyncOutcome) {
    for entry in WalkDir::new(dst_root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_pointer(path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(dst_root) else {
            continue;
        };
        let Some(source) = source_for(src_root, rel) else {
            debug!(pointer = %rel.display(), "not in expanded shape, leaving");
            continue;
        };
        if source.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                info!(pointer = %rel.display(), "orphaned pointer removed");
                outcome.files_deleted += 1;
            }
            Err(err) => {
                warn!(
                    code = SkipCode::FilesystemIo.as_str(),
                    pointer = %rel.display(),
                    error = %err,
                    "orphan removal failed"
                );
                outcome.errors += 1;
            }
        }
    }
}

fn subtree_has_pointer(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file() && is_pointer(e.path()))
}

/// Prune destination directories whose subtree holds no pointer file at
/// all. Deepest first, so an emptied chain collapses in one pass.
fn delete_empty_dirs(dst_root: &Path, outcome: &mut SyncOutcome) {
    let mut doomed: Vec<PathBuf> = WalkDir::new(dst_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.path() != dst_root)
        .filter(|e| !subtree_has_pointer(e.path()))
        .map(|e| e.into_path())
        .collect();
    doomed.sort();
    doomed.reverse();
    for dir in doomed {
        if !dir.exists() {
            continue;
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "pointer-free directory removed");
                outcome.dirs_removed += 1;
            }
            Err(err) => {
                warn!(
                    code = SkipCode::FilesystemIo.as_str(),
                    dir = %dir.display(),
                    error = %err,
                    "directory removal failed"
                );
                outcome.errors += 1;
            }
        }
    }
}

/// One full sync cycle: update, delete orphans, prune empty dirs.
pub fn run(src_root: &Path, dst_root: &Path) -> Result<SyncOutcome> {
    if !src_root.is_dir() {
        return Err(CuratorError::NotADirectory(src_root.to_path_buf()).into());
    }
    fs::create_dir_all(dst_root)
        .with_context(|| format!("failed to create {}", dst_root.display()))?;

    let mut outcome = SyncOutcome::default();
    update(src_root, dst_root, &mut outcome);
    delete_orphans(src_root, dst_root, &mut outcome);
    delete_empty_dirs(dst_root, &mut outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn pointer_expands_into_stem_directory() {
        let dst = expanded_destination(Path::new("/out"), Path::new("aa/bb/cc.strm"));
        assert_eq!(dst, Some(PathBuf::from("/out/aa/bb/cc/cc.strm")));

        let top = expanded_destination(Path::new("/out"), Path::new("cc.strm"));
        assert_eq!(top, Some(PathBuf::from("/out/cc/cc.strm")));
    }

    #[test]
    fn source_for_rejects_unexpanded_shapes() {
        assert_eq!(
            source_for(Path::new("/in"), Path::new("aa/cc/cc.strm")),
            Some(PathBuf::from("/in/aa/cc.strm"))
        );
        assert_eq!(source_for(Path::new("/in"), Path::new("aa/dd/cc.strm")), None);
    }

    #[test]
    fn sync_copies_new_pointers_into_expanded_layout() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_file(&src.join("brand/ABC-123.strm"), b"/library/ABC-123.mp4");

        let outcome = run(&src, &dst).expect("sync");
        assert_eq!(outcome.files_written, 1);
        assert_eq!(
            fs::read(dst.join("brand/ABC-123/ABC-123.strm")).expect("read"),
            b"/library/ABC-123.mp4"
        );
    }

    #[test]
    fn second_sync_writes_nothing() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_file(&src.join("brand/ABC-123.strm"), b"/library/ABC-123.mp4");

        run(&src, &dst).expect("sync");
        let again = run(&src, &dst).expect("sync");
        assert_eq!(again.files_written, 0);
        assert_eq!(again.files_deleted, 0);
        assert_eq!(again.dirs_removed, 0);
    }

    #[test]
    fn removed_source_cascades_to_empty_dirs() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_file(&src.join("brand/ABC-123.strm"), b"ptr");
        write_file(&src.join("brand/ABC-124.strm"), b"ptr");

        run(&src, &dst).expect("sync");
        fs::remove_file(src.join("brand/ABC-123.strm")).expect("remove");
        let outcome = run(&src, &dst).expect("sync");

        assert_eq!(outcome.files_deleted, 1);
        assert!(!dst.join("brand/ABC-123").exists());
        assert!(dst.join("brand/ABC-124/ABC-124.strm").exists());
    }

    #[test]
    fn non_pointer_files_are_ignored() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_file(&src.join("brand/cover.jpg"), b"img");
        write_file(&src.join("brand/ABC-123.strm"), b"ptr");

        let outcome = run(&src, &dst).expect("sync");
        assert_eq!(outcome.files_examined, 1);
        assert!(!dst.join("brand/cover").exists());
    }

    #[test]
    fn foreign_destination_files_survive() {
        let tmp = tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).expect("mkdir");
        write_file(&dst.join("hand-placed/other.strm"), b"keep me");

        let outcome = run(&src, &dst).expect("sync");
        assert_eq!(outcome.files_deleted, 0);
        assert!(dst.join("hand-placed/other.strm").exists());
    }

    #[test]
    fn missing_source_root_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let err = run(&tmp.path().join("absent"), &tmp.path().join("dst"));
        assert!(err.is_err());
    }
}
