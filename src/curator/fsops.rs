use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::UNIX_EPOCH;

pub const VIDEO_SUFFIXES: &[&str] = &[
    "mp4", "mkv", "avi", "wmv", "mov", "flv", "m4v", "ts", "rmvb",
];

pub fn has_video_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            VIDEO_SUFFIXES.contains(&lower.as_str())
        })
}

pub fn is_video(path: &Path) -> bool {
    path.is_file() && has_video_suffix(path)
}

pub fn file_size(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    Ok(meta.len())
}

pub fn modified_epoch_secs(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let modified = meta.modified().unwrap_or(UNIX_EPOCH);
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}

/// Move a file, falling back to copy+remove when rename cannot cross the
/// device boundary. Content is preserved either way; the caller is
/// responsible for checking that `to` does not already exist.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            if matches!(
                rename_err.kind(),
                ErrorKind::CrossesDevices | ErrorKind::PermissionDenied
            ) {
                fs::copy(from, to).with_context(|| {
                    format!("failed to copy {} to {}", from.display(), to.display())
                })?;
                fs::remove_file(from)
                    .with_context(|| format!("failed to remove {}", from.display()))?;
                Ok(())
            } else {
                Err(rename_err).with_context(|| {
                    format!("failed to move {} to {}", from.display(), to.display())
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn video_suffix_is_case_insensitive() {
        assert!(has_video_suffix(Path::new("FOO-001.MP4")));
        assert!(has_video_suffix(Path::new("foo.mkv")));
        assert!(!has_video_suffix(Path::new("foo.nfo")));
        assert!(!has_video_suffix(Path::new("foo")));
    }

    #[test]
    fn move_file_creates_parent_dirs() {
        let tmp = tempdir().expect("tempdir");
        let from = tmp.path().join("a.mp4");
        let to = tmp.path().join("nested/deep/b.mp4");
        fs::write(&from, b"content").expect("write");

        move_file(&from, &to).expect("move");

        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read"), b"content");
    }

    #[test]
    fn move_file_same_path_is_noop() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("a.mp4");
        fs::write(&path, b"content").expect("write");

        move_file(&path, &path).expect("move");
        assert!(path.exists());
    }
}
