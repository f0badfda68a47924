//! Intake flattening: relocate qualifying videos out of staging subfolders
//! up to the flat staging root. Each subfolder is a decide step (pure, so
//! dry runs cost nothing) followed by an apply step; ambiguous groupings
//! are skipped whole, never partially resolved.

use crate::curator::avid::{Avid, AvidResolver};
use crate::curator::cooldown::{Clock, CooldownMap};
use crate::curator::fsops::{file_size, has_video_suffix, is_video, move_file};
use crate::curator::rename;
use crate::error::SkipCode;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct VideoFile {
    pub path: PathBuf,
    pub size: u64,
    pub avid: Option<Avid>,
}

/// Everything the decide step needs to know about one staging subfolder.
#[derive(Debug, Clone)]
pub struct FolderScan {
    pub folder: PathBuf,
    /// Videos at or above the route minimum size.
    pub videos: Vec<VideoFile>,
    /// Videos below the threshold; excluded from eligibility, never deleted.
    pub small_videos: usize,
}

#[derive(Debug, Clone)]
pub enum SkipReason {
    NoQualifyingFiles,
    AmbiguousGroup { avids: Vec<String> },
    UnresolvedIdentifier,
    NotMultiPart,
    AlreadyStaged { avid: Avid },
}

impl SkipReason {
    pub fn code(&self) -> Option<SkipCode> {
        match self {
            Self::NoQualifyingFiles => None,
            Self::AmbiguousGroup { .. } | Self::NotMultiPart => Some(SkipCode::AmbiguousGroup),
            Self::UnresolvedIdentifier => Some(SkipCode::UnresolvedIdentifier),
            Self::AlreadyStaged { .. } => Some(SkipCode::DestinationExists),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FolderDecision {
    Flatten {
        avid: Avid,
        moves: Vec<(PathBuf, PathBuf)>,
    },
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FlattenOutcome {
    pub folders_scanned: usize,
    pub folders_flattened: usize,
    pub files_moved: usize,
    pub folders_skipped: usize,
    pub folders_pruned: usize,
    pub errors: usize,
}

/// A subfolder named like a video file confuses later suffix checks;
/// rename it to its stem before looking inside.
pub fn sanitize_folder_names(root: &Path) -> Result<usize> {
    let mut renamed = 0usize;
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() || !has_video_suffix(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_owned()) else {
            continue;
        };
        let target = root.join(&stem);
        if target.exists() {
            warn!(
                folder = %path.display(),
                "cannot sanitize folder name, target exists, skipping"
            );
            continue;
        }
        info!(
            from = %path.display(),
            to = %target.display(),
            "sanitizing video-suffixed folder name"
        );
        if let Err(err) = fs::rename(&path, &target) {
            warn!(
                code = SkipCode::FilesystemIo.as_str(),
                folder = %path.display(),
                error = %err,
                "failed to sanitize folder name, skipping"
            );
            continue;
        }
        renamed += 1;
    }
    Ok(renamed)
}

/// Enumerate a subfolder's videos and resolve their identifiers. A file
/// whose own name yields nothing borrows the folder name.
pub fn scan_folder(
    resolver: &AvidResolver,
    folder: &Path,
    min_size_bytes: u64,
) -> Result<FolderScan> {
    let folder_name = folder
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let mut videos = Vec::new();
    let mut small_videos = 0usize;
    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !is_video(&path) {
            continue;
        }
        let size = file_size(&path)?;
        if size < min_size_bytes {
            small_videos += 1;
            continue;
        }
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let avid = resolver
            .resolve(name)
            .or_else(|| resolver.resolve(&folder_name));
        videos.push(VideoFile { path, size, avid });
    }
    Ok(FolderScan {
        folder: folder.to_path_buf(),
        videos,
        small_videos,
    })
}

/// Pure eligibility decision for one scanned subfolder.
pub fn decide(scan: &FolderScan, staging_root: &Path, existing: &BTreeSet<Avid>) -> FolderDecision {
    if scan.videos.is_empty() {
        return FolderDecision::Skip(SkipReason::NoQualifyingFiles);
    }

    let resolved: BTreeSet<&Avid> = scan.videos.iter().filter_map(|v| v.avid.as_ref()).collect();
    if resolved.is_empty() {
        return FolderDecision::Skip(SkipReason::UnresolvedIdentifier);
    }
    if resolved.len() > 1 {
        return FolderDecision::Skip(SkipReason::AmbiguousGroup {
            avids: resolved.iter().map(|a| a.as_str().to_string()).collect(),
        });
    }
    let Some(avid) = resolved.iter().next().map(|a| (*a).clone()) else {
        return FolderDecision::Skip(SkipReason::UnresolvedIdentifier);
    };

    let qualifying: Vec<&VideoFile> = scan
        .videos
        .iter()
        .filter(|v| v.avid.is_some())
        .collect();
    if qualifying.len() > 1 {
        let candidates: Vec<rename::Candidate> = qualifying
            .iter()
            .map(|v| rename::Candidate {
                path: v.path.clone(),
                size: v.size,
            })
            .collect();
        if !rename::is_plausible_group(&candidates) {
            return FolderDecision::Skip(SkipReason::NotMultiPart);
        }
    }

    if existing.contains(&avid) {
        return FolderDecision::Skip(SkipReason::AlreadyStaged { avid });
    }

    let moves = qualifying
        .iter()
        .filter_map(|v| {
            let name = v.path.file_name()?;
            Some((v.path.clone(), staging_root.join(name)))
        })
        .collect();
    FolderDecision::Flatten { avid, moves }
}

fn apply_moves(moves: &[(PathBuf, PathBuf)], dry_run: bool) -> Result<usize> {
    let mut moved = 0usize;
    for (from, to) in moves {
        if to.exists() {
            warn!(
                code = SkipCode::DestinationExists.as_str(),
                to = %to.display(),
                "flatten target exists, skipping move"
            );
            continue;
        }
        if dry_run {
            info!(from = %from.display(), to = %to.display(), "dry-run: would move");
            continue;
        }
        move_file(from, to)?;
        moved += 1;
    }
    Ok(moved)
}

fn folder_has_videos(folder: &Path) -> Result<bool> {
    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
    for entry in entries {
        if is_video(&entry?.path()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Remove the subfolder once no video content remains in it.
fn prune_folder(folder: &Path, dry_run: bool) -> Result<bool> {
    if folder_has_videos(folder)? {
        return Ok(false);
    }
    if dry_run {
        info!(folder = %folder.display(), "dry-run: would prune emptied folder");
        return Ok(false);
    }
    fs::remove_dir_all(folder)
        .with_context(|| format!("failed to remove {}", folder.display()))?;
    Ok(true)
}

fn log_skip(folder: &Path, reason: &SkipReason) {
    match reason {
        SkipReason::NoQualifyingFiles => {
            debug!(folder = %folder.display(), "no qualifying video files, skipping");
        }
        SkipReason::AmbiguousGroup { avids } => {
            warn!(
                code = SkipCode::AmbiguousGroup.as_str(),
                folder = %folder.display(),
                avids = %avids.join(", "),
                "multiple identifiers in one folder, skipping"
            );
        }
        SkipReason::UnresolvedIdentifier => {
            warn!(
                code = SkipCode::UnresolvedIdentifier.as_str(),
                folder = %folder.display(),
                "no identifier resolvable, skipping"
            );
        }
        SkipReason::NotMultiPart => {
            warn!(
                code = SkipCode::AmbiguousGroup.as_str(),
                folder = %folder.display(),
                "multiple videos but not a multi-part set, skipping"
            );
        }
        SkipReason::AlreadyStaged { avid } => {
            warn!(
                code = SkipCode::DestinationExists.as_str(),
                folder = %folder.display(),
                avid = %avid,
                "identifier already staged, skipping"
            );
        }
    }
}

/// Flatten every immediate subfolder of `root`. I/O failures on one
/// subfolder are logged and the walk continues.
pub fn run<C: Clock>(
    resolver: &AvidResolver,
    root: &Path,
    min_size_mb: u64,
    cooldown: &mut CooldownMap<C>,
    dry_run: bool,
) -> Result<FlattenOutcome> {
    let mut outcome = FlattenOutcome::default();
    let min_size_bytes = min_size_mb * 1024 * 1024;
    cooldown.prune_expired();

    if let Err(err) = sanitize_folder_names(root) {
        warn!(
            code = SkipCode::FilesystemIo.as_str(),
            root = %root.display(),
            error = %err,
            "folder name sanitization failed"
        );
        outcome.errors += 1;
    }

    let mut existing: BTreeSet<Avid> = BTreeSet::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    let mut folders = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        } else if is_video(&path) {
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if let Some(avid) = resolver.resolve(name) {
                existing.insert(avid);
            }
        }
    }
    folders.sort();

    for folder in folders {
        let key = folder.display().to_string();
        if cooldown.is_cooling(&key) {
            debug!(folder = %key, "in failure cooldown, skipping");
            continue;
        }
        outcome.folders_scanned += 1;

        let result = (|| -> Result<()> {
            let scan = scan_folder(resolver, &folder, min_size_bytes)?;
            if scan.small_videos > 0 {
                debug!(
                    folder = %folder.display(),
                    count = scan.small_videos,
                    min_size_mb,
                    "videos below size threshold left in place"
                );
            }
            match decide(&scan, root, &existing) {
                FolderDecision::Skip(reason) => {
                    log_skip(&folder, &reason);
                    outcome.folders_skipped += 1;
                    if matches!(reason, SkipReason::UnresolvedIdentifier) {
                        cooldown.record_failure(&key);
                    }
                }
                FolderDecision::Flatten { avid, moves } => {
                    info!(folder = %folder.display(), %avid, "flattening");
                    outcome.files_moved += apply_moves(&moves, dry_run)?;
                    outcome.folders_flattened += 1;
                    existing.insert(avid);
                    if prune_folder(&folder, dry_run)? {
                        outcome.folders_pruned += 1;
                    }
                }
            }
            Ok(())
        })();

        if let Err(err) = result {
            warn!(
                code = SkipCode::FilesystemIo.as_str(),
                folder = %folder.display(),
                error = %err,
                "subfolder failed, continuing"
            );
            outcome.errors += 1;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvidConfig;
    use crate::curator::cooldown::CooldownMap;
    use tempfile::tempdir;

    fn resolver() -> AvidResolver {
        AvidResolver::new(&AvidConfig::default()).expect("resolver")
    }

    fn write_file(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, vec![0u8; len]).expect("write");
    }

    #[test]
    fn ambiguous_folder_is_left_untouched() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        let folder = root.join("mixed");
        write_file(&folder.join("ABC-123.mp4"), 16);
        write_file(&folder.join("XYZ-777.mp4"), 16);

        let mut cooldown = CooldownMap::new(0);
        let outcome = run(&resolver(), root, 0, &mut cooldown, false).expect("run");

        assert_eq!(outcome.folders_skipped, 1);
        assert_eq!(outcome.files_moved, 0);
        assert!(folder.join("ABC-123.mp4").exists());
        assert!(folder.join("XYZ-777.mp4").exists());
    }

    #[test]
    fn eligible_folder_flattens_and_prunes() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        let folder = root.join("release");
        write_file(&folder.join("FOO-001.part1.mp4"), 16);
        write_file(&folder.join("FOO-001.part2.mp4"), 16);

        let mut cooldown = CooldownMap::new(0);
        let outcome = run(&resolver(), root, 0, &mut cooldown, false).expect("run");

        assert_eq!(outcome.folders_flattened, 1);
        assert_eq!(outcome.files_moved, 2);
        assert_eq!(outcome.folders_pruned, 1);
        assert!(root.join("FOO-001.part1.mp4").exists());
        assert!(root.join("FOO-001.part2.mp4").exists());
        assert!(!folder.exists());
    }

    #[test]
    fn small_files_do_not_qualify_and_are_kept() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        let folder = root.join("tiny");
        write_file(&folder.join("BAR-002.mp4"), 16);

        let mut cooldown = CooldownMap::new(0);
        // 1 MB threshold, the file is 16 bytes
        let outcome = run(&resolver(), root, 1, &mut cooldown, false).expect("run");

        assert_eq!(outcome.folders_flattened, 0);
        assert!(folder.join("BAR-002.mp4").exists());
    }

    #[test]
    fn already_staged_identifier_skips_the_folder() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        write_file(&root.join("FOO-001.mp4"), 16);
        let folder = root.join("duplicate");
        write_file(&folder.join("FOO-001.mp4"), 16);

        let mut cooldown = CooldownMap::new(0);
        let outcome = run(&resolver(), root, 0, &mut cooldown, false).expect("run");

        assert_eq!(outcome.folders_skipped, 1);
        assert!(folder.join("FOO-001.mp4").exists());
    }

    #[test]
    fn unresolved_folder_enters_cooldown() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        let folder = root.join("garbage");
        write_file(&folder.join("home video.mp4"), 16);

        let mut cooldown = CooldownMap::new(3_600);
        let first = run(&resolver(), root, 0, &mut cooldown, false).expect("run");
        assert_eq!(first.folders_scanned, 1);
        assert_eq!(first.folders_skipped, 1);

        let second = run(&resolver(), root, 0, &mut cooldown, false).expect("run");
        assert_eq!(second.folders_scanned, 0);
    }

    #[test]
    fn video_suffixed_folder_name_is_sanitized() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        fs::create_dir_all(root.join("ABC-123.mp4")).expect("mkdir");

        let renamed = sanitize_folder_names(root).expect("sanitize");
        assert_eq!(renamed, 1);
        assert!(root.join("ABC-123").is_dir());
        assert!(!root.join("ABC-123.mp4").exists());
    }

    #[test]
    fn dry_run_moves_nothing() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        let folder = root.join("release");
        write_file(&folder.join("FOO-001.mp4"), 16);

        let mut cooldown = CooldownMap::new(0);
        let outcome = run(&resolver(), root, 0, &mut cooldown, true).expect("run");

        assert_eq!(outcome.files_moved, 0);
        assert!(folder.join("FOO-001.mp4").exists());
        assert!(!root.join("FOO-001.mp4").exists());
    }
}
