use anyhow::Result;

use crate::commands::CommandReport;
use crate::config::CuratorConfig;
use crate::curator::archive;
use crate::curator::avid::AvidResolver;
use crate::curator::brand::BrandRouter;
use crate::curator::cooldown::CooldownMap;
use crate::curator::lock;

pub fn run(cfg: &CuratorConfig, route: Option<&str>, dry_run: bool) -> Result<CommandReport> {
    let mut report = CommandReport::new("archive");
    let Some(lock) = lock::acquire(&cfg.state_dir, "archive")? else {
        report.detail("another archive pass holds the lock, skipping this run");
        return Ok(report);
    };
    tracing::debug!(lock = %lock.path().display(), "archive pass lock acquired");

    let resolver = AvidResolver::new(&cfg.avid)?;
    let router = BrandRouter::new(&cfg.archive.brand_groups, &cfg.archive.default_bucket);
    let mut cooldown = CooldownMap::new(cfg.archive.cooldown_secs);
    let outcome = archive::run_all(&resolver, &router, &cfg.archive, &mut cooldown, route, dry_run);

    if dry_run {
        report.detail("dry run, no changes applied");
    }
    if let Some(route) = route
        && outcome.routes_processed == 0
        && outcome.routes_failed == 0
    {
        report.issue(format!("route not configured: {route}"));
        return Ok(report);
    }

    let t = &outcome.totals;
    report.detail(format!("routes processed: {}", outcome.routes_processed));
    report.detail(format!(
        "folders flattened: {} ({} files moved, {} folders pruned)",
        t.flatten.folders_flattened, t.flatten.files_moved, t.flatten.folders_pruned
    ));
    report.detail(format!("files renamed: {}", t.files_renamed));
    report.detail(format!("files archived: {}", t.files_archived));
    if t.flatten.folders_skipped > 0 {
        report.detail(format!("folders skipped: {}", t.flatten.folders_skipped));
    }
    if t.skipped_existing > 0 {
        report.detail(format!(
            "moves skipped, destination occupied: {}",
            t.skipped_existing
        ));
    }
    if t.skipped_unresolved > 0 {
        report.detail(format!("files left unresolved: {}", t.skipped_unresolved));
    }
    if outcome.routes_failed > 0 {
        report.issue(format!("routes failed: {}", outcome.routes_failed));
    }
    let errors = t.errors + t.flatten.errors;
    if errors > 0 {
        report.issue(format!("file operations failed: {errors}"));
    }
    Ok(report)
}
