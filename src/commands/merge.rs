use anyhow::Result;
use std::path::Path;

use crate::commands::CommandReport;
use crate::config::CuratorConfig;
use crate::curator::avid::AvidResolver;
use crate::curator::merge;

pub fn run(
    cfg: &CuratorConfig,
    search_dir: &Path,
    dst_dir: &Path,
    filter: Option<&str>,
) -> Result<CommandReport> {
    let mut report = CommandReport::new("merge");
    let resolver = AvidResolver::new(&cfg.avid)?;
    let outcome = merge::run(
        &resolver,
        &cfg.merge,
        &cfg.mapping.src_dir,
        search_dir,
        dst_dir,
        filter,
    )?;

    report.detail(format!("part chains found: {}", outcome.titles_found));
    report.detail(format!("titles merged: {}", outcome.titles_merged));
    if outcome.titles_skipped > 0 {
        report.detail(format!(
            "titles skipped, destination occupied: {}",
            outcome.titles_skipped
        ));
    }
    if outcome.errors > 0 {
        report.issue(format!("merges failed: {}", outcome.errors));
    }
    Ok(report)
}
