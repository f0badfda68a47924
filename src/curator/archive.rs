//! The archive pass: per configured route, sanitize -> flatten -> rename
//! -> move into the brand-routed library layout. Every mutation is
//! check-then-act idempotent; a re-run after a crash converges without
//! overwriting or duplicating anything.

use crate::config::{ArchiveConfig, CollisionPolicy, RouteSpec};
use crate::curator::avid::{Avid, AvidResolver};
use crate::curator::brand::BrandRouter;
use crate::curator::cooldown::{Clock, CooldownMap};
use crate::curator::flatten::{self, FlattenOutcome};
use crate::curator::fsops::{file_size, is_video, move_file};
use crate::curator::rename::{self, Candidate};
use crate::error::{CuratorError, SkipCode};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RouteOutcome {
    pub flatten: FlattenOutcome,
    pub files_renamed: usize,
    pub files_archived: usize,
    pub skipped_existing: usize,
    pub skipped_unresolved: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ArchivePassOutcome {
    pub routes_processed: usize,
    pub routes_failed: usize,
    pub totals: RouteOutcome,
}

impl ArchivePassOutcome {
    fn absorb(&mut self, route: &RouteOutcome) {
        self.routes_processed += 1;
        let t = &mut self.totals;
        t.flatten.folders_scanned += route.flatten.folders_scanned;
        t.flatten.folders_flattened += route.flatten.folders_flattened;
        t.flatten.files_moved += route.flatten.files_moved;
        t.flatten.folders_skipped += route.flatten.folders_skipped;
        t.flatten.folders_pruned += route.flatten.folders_pruned;
        t.flatten.errors += route.flatten.errors;
        t.files_renamed += route.files_renamed;
        t.files_archived += route.files_archived;
        t.skipped_existing += route.skipped_existing;
        t.skipped_unresolved += route.skipped_unresolved;
        t.errors += route.errors;
    }
}

/// Apply canonical renames to the videos sitting at the staging root.
/// Returns (renamed, errors); per-file failures are logged and skipped.
fn rename_staging_root(
    resolver: &AvidResolver,
    root: &Path,
    policy: CollisionPolicy,
    dry_run: bool,
) -> Result<(usize, usize)> {
    let mut groups: BTreeMap<Avid, Vec<Candidate>> = BTreeMap::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("failed to read {}", root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !is_video(&path) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let Some(avid) = resolver.resolve(&name) else {
            warn!(
                code = SkipCode::UnresolvedIdentifier.as_str(),
                file = %path.display(),
                "no identifier for staged file, leaving as is"
            );
            continue;
        };
        let size = file_size(&path)?;
        groups.entry(avid).or_default().push(Candidate { path, size });
    }

    let mut renamed = 0usize;
    let mut errors = 0usize;
    for (avid, files) in &groups {
        for plan in rename::plan(avid, files, policy) {
            let to = root.join(&plan.to_name);
            if to.exists() {
                warn!(
                    code = SkipCode::DestinationExists.as_str(),
                    to = %to.display(),
                    "rename target exists, skipping"
                );
                continue;
            }
            if dry_run {
                info!(
                    from = %plan.from.display(),
                    to = %plan.to_name,
                    "dry-run: would rename"
                );
                continue;
            }
            match fs::rename(&plan.from, &to) {
                Ok(()) => {
                    info!(from = %plan.from.display(), to = %plan.to_name, "renamed");
                    renamed += 1;
                }
                Err(err) => {
                    warn!(
                        code = SkipCode::FilesystemIo.as_str(),
                        from = %plan.from.display(),
                        error = %err,
                        "rename failed, skipping"
                    );
                    errors += 1;
                }
            }
        }
    }
    Ok((renamed, errors))
}

/// Move each staged video into its brand-routed destination. Only ever
/// adds: an occupied destination is a logged no-op.
fn archive_staging_root(
    resolver: &AvidResolver,
    router: &BrandRouter,
    src_root: &Path,
    dst_root: &Path,
    dry_run: bool,
    outcome: &mut RouteOutcome,
) -> Result<()> {
    let entries =
        fs::read_dir(src_root).with_context(|| format!("failed to read {}", src_root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !is_video(&path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        let Some(avid) = resolver.resolve(&name) else {
            warn!(
                code = SkipCode::UnresolvedIdentifier.as_str(),
                file = %path.display(),
                "no identifier, leaving at staging root"
            );
            outcome.skipped_unresolved += 1;
            continue;
        };
        let dst = dst_root.join(router.route(&avid)).join(&name);
        if dst.exists() {
            warn!(
                code = SkipCode::DestinationExists.as_str(),
                dst = %dst.display(),
                "destination occupied, skipping move"
            );
            outcome.skipped_existing += 1;
            continue;
        }
        if dry_run {
            info!(from = %path.display(), to = %dst.display(), "dry-run: would archive");
            continue;
        }
        match move_file(&path, &dst) {
            Ok(()) => {
                info!(from = %name, to = %dst.display(), "archived");
                outcome.files_archived += 1;
            }
            Err(err) => {
                warn!(
                    code = SkipCode::FilesystemIo.as_str(),
                    file = %path.display(),
                    error = %err,
                    "archive move failed, skipping"
                );
                outcome.errors += 1;
            }
        }
    }
    Ok(())
}

pub fn run_route<C: Clock>(
    resolver: &AvidResolver,
    router: &BrandRouter,
    cfg: &ArchiveConfig,
    route_src: &str,
    route: &RouteSpec,
    cooldown: &mut CooldownMap<C>,
    dry_run: bool,
) -> Result<RouteOutcome> {
    let src_root = cfg.src_dir.join(route_src);
    let dst_root = cfg.dst_dir.join(route.dst());
    let min_size_mb = route.min_size_mb(cfg.min_size_mb);
    if !src_root.is_dir() {
        return Err(CuratorError::NotADirectory(src_root).into());
    }
    if !dry_run {
        fs::create_dir_all(&dst_root)
            .with_context(|| format!("failed to create {}", dst_root.display()))?;
    }

    let mut outcome = RouteOutcome {
        flatten: flatten::run(resolver, &src_root, min_size_mb, cooldown, dry_run)?,
        ..RouteOutcome::default()
    };
    let (renamed, rename_errors) =
        rename_staging_root(resolver, &src_root, cfg.collision_policy, dry_run)?;
    outcome.files_renamed = renamed;
    outcome.errors += rename_errors;
    archive_staging_root(resolver, router, &src_root, &dst_root, dry_run, &mut outcome)?;
    Ok(outcome)
}

/// Process every configured route; one failed route never blocks the rest.
pub fn run_all<C: Clock>(
    resolver: &AvidResolver,
    router: &BrandRouter,
    cfg: &ArchiveConfig,
    cooldown: &mut CooldownMap<C>,
    route_filter: Option<&str>,
    dry_run: bool,
) -> ArchivePassOutcome {
    let mut outcome = ArchivePassOutcome::default();
    for (route_src, route) in &cfg.routes {
        if route_filter.is_some_and(|f| f != route_src) {
            continue;
        }
        info!(route = %route_src, dst = %route.dst(), "processing route");
        match run_route(resolver, router, cfg, route_src, route, cooldown, dry_run) {
            Ok(route) => outcome.absorb(&route),
            Err(err) => {
                warn!(
                    code = SkipCode::FilesystemIo.as_str(),
                    route = %route_src,
                    error = %err,
                    "route failed, continuing with remaining routes"
                );
                outcome.routes_failed += 1;
            }
        }
    }
    outcome
}
