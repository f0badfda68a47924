//! Merge multi-part titles back into a single file. Pointers named
//! `AVID-cdN.strm` under a search directory are grouped per identifier,
//! resolved to the real part files they point at, and concatenated with
//! ffmpeg's concat demuxer (stream copy, no re-encode). The source parts
//! are removed only after a successful merge; their pointers become
//! orphans for the next mapping sync to clean up.

use crate::config::MergeConfig;
use crate::curator::avid::{Avid, AvidResolver};
use crate::curator::fsops::move_file;
use crate::curator::util::run_command_with_optional_timeout;
use crate::error::{CuratorError, SkipCode};
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use tracing::{info, warn};
use walkdir::WalkDir;

static RE_CD_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-cd(\d+)\.strm$").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MergeOutcome {
    pub titles_found: usize,
    pub titles_merged: usize,
    pub titles_skipped: usize,
    pub errors: usize,
}

/// One part of a multi-part title: its index and the pointer holding the
/// real path.
#[derive(Debug, Clone)]
pub struct Part {
    pub index: u32,
    pub pointer: PathBuf,
}

/// Whether the sorted part indexes form an unbroken run. A chain with a
/// hole must not be merged; the result would silently skip content.
pub fn is_contiguous(parts: &[Part]) -> bool {
    parts
        .windows(2)
        .all(|pair| pair[1].index == pair[0].index + 1)
}

/// Group `-cdN.strm` pointers under `search_dir` by identifier, sorted
/// by part index. Chains with missing parts are dropped with a warning.
pub fn collect_chains(
    resolver: &AvidResolver,
    search_dir: &Path,
    filter: Option<&Regex>,
) -> BTreeMap<Avid, Vec<Part>> {
    let mut chains: BTreeMap<Avid, Vec<Part>> = BTreeMap::new();
    for entry in WalkDir::new(search_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(caps) = RE_CD_POINTER.captures(name) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        let Some(avid) = resolver.resolve(name) else {
            warn!(
                code = SkipCode::UnresolvedIdentifier.as_str(),
                file = %entry.path().display(),
                "part pointer has no identifier, skipping"
            );
            continue;
        };
        if filter.is_some_and(|f| !f.is_match(avid.as_str())) {
            continue;
        }
        chains.entry(avid).or_default().push(Part {
            index,
            pointer: entry.into_path(),
        });
    }

    chains.retain(|avid, parts| {
        parts.sort_by_key(|p| p.index);
        if parts.len() < 2 {
            warn!(%avid, "single part only, nothing to merge");
            return false;
        }
        if !is_contiguous(parts) {
            warn!(%avid, "part chain has a hole, skipping");
            return false;
        }
        true
    });
    chains
}

/// Read the real path a pointer refers to.
fn resolve_pointer(pointer: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(pointer)
        .with_context(|| format!("failed to read {}", pointer.display()))?;
    Ok(PathBuf::from(content.trim()))
}

/// Locate the ffmpeg binary: use the configured path as-is when it
/// exists, otherwise look it up on PATH.
fn ffmpeg_path(cfg: &MergeConfig) -> Result<PathBuf> {
    if cfg.ffmpeg_bin.exists() {
        return Ok(cfg.ffmpeg_bin.clone());
    }
    which::which(&cfg.ffmpeg_bin)
        .with_context(|| format!("ffmpeg not found: {}", cfg.ffmpeg_bin.display()))
}

fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|p| {
            let escaped = p.display().to_string().replace('\'', r"'\''");
            format!("file '{escaped}'")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Concatenate `parts` into `dst`. An existing destination is a logged
/// no-op; `Ok(false)` means nothing was written.
fn merge_one(
    ffmpeg: &Path,
    avid: &Avid,
    parts: &[PathBuf],
    dst: &Path,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    if dst.exists() {
        warn!(
            code = SkipCode::DestinationExists.as_str(),
            dst = %dst.display(),
            "merge target exists, skipping"
        );
        return Ok(false);
    }

    let work_dir = tempfile::tempdir().context("failed to create work dir")?;
    let list_path = work_dir.path().join("concat.txt");
    let output_path = work_dir.path().join("output.mp4");
    fs::write(&list_path, concat_list(parts))
        .with_context(|| format!("failed to write {}", list_path.display()))?;

    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-hide_banner")
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(&list_path)
        .arg("-c")
        .arg("copy")
        .arg(&output_path);
    let output = run_command_with_optional_timeout(&mut cmd, timeout_secs)?;
    if !output.status.success() {
        return Err(CuratorError::Merge {
            avid: avid.to_string(),
            reason: format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        }
        .into());
    }

    move_file(&output_path, dst)?;
    info!(%avid, dst = %dst.display(), "merged");
    Ok(true)
}

/// Merge every eligible chain under `search_dir` (relative to the
/// mapping source tree) into `dst_dir`. One failed title never blocks
/// the rest.
pub fn run(
    resolver: &AvidResolver,
    cfg: &MergeConfig,
    mapping_src: &Path,
    search_dir: &Path,
    dst_dir: &Path,
    filter: Option<&str>,
) -> Result<MergeOutcome> {
    let search_root = mapping_src.join(search_dir);
    if !search_root.is_dir() {
        return Err(CuratorError::NotADirectory(search_root).into());
    }
    fs::create_dir_all(dst_dir)
        .with_context(|| format!("failed to create {}", dst_dir.display()))?;
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("invalid merge filter")?;

    let chains = collect_chains(resolver, &search_root, filter.as_ref());
    let mut outcome = MergeOutcome {
        titles_found: chains.len(),
        ..MergeOutcome::default()
    };
    if chains.is_empty() {
        info!("no part chains to merge");
        return Ok(outcome);
    }
    let ffmpeg = ffmpeg_path(cfg)?;

    for (avid, parts) in &chains {
        info!(
            %avid,
            parts = parts.len(),
            "merging part chain"
        );
        let result = (|| -> Result<bool> {
            let real_parts = parts
                .iter()
                .map(|p| resolve_pointer(&p.pointer))
                .collect::<Result<Vec<_>>>()?;
            let dst = dst_dir.join(format!("{avid}.mp4"));
            let merged = merge_one(&ffmpeg, avid, &real_parts, &dst, cfg.timeout_secs)?;
            if merged {
                for real in &real_parts {
                    fs::remove_file(real)
                        .with_context(|| format!("failed to remove {}", real.display()))?;
                }
            }
            Ok(merged)
        })();
        match result {
            Ok(true) => outcome.titles_merged += 1,
            Ok(false) => outcome.titles_skipped += 1,
            Err(err) => {
                warn!(
                    %avid,
                    error = %err,
                    "merge failed, continuing with remaining titles"
                );
                outcome.errors += 1;
            }
        }
    }
    Ok(outcome)
}
