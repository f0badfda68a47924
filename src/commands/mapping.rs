use anyhow::Result;

use crate::commands::CommandReport;
use crate::config::CuratorConfig;
use crate::curator::lock;
use crate::curator::mapping;

pub fn run(cfg: &CuratorConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("mapping");
    let Some(_lock) = lock::acquire(&cfg.state_dir, "mapping")? else {
        report.detail("another mapping pass holds the lock, skipping this run");
        return Ok(report);
    };

    let outcome = mapping::run(&cfg.mapping.src_dir, &cfg.mapping.dst_dir)?;
    report.detail(format!("pointers examined: {}", outcome.files_examined));
    report.detail(format!("pointers written: {}", outcome.files_written));
    report.detail(format!("orphans removed: {}", outcome.files_deleted));
    report.detail(format!("empty dirs removed: {}", outcome.dirs_removed));
    if outcome.errors > 0 {
        report.issue(format!("pointer operations failed: {}", outcome.errors));
    }
    Ok(report)
}
