use anyhow::Result;

use crate::commands::CommandReport;
use crate::config::CuratorConfig;
use crate::curator::lock;
use crate::curator::monitor;

/// Blocks until the watcher shuts down.
pub fn run(cfg: &CuratorConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("mapping-watch");
    let Some(_lock) = lock::acquire(&cfg.state_dir, "mapping")? else {
        report.issue("another mapping pass holds the lock, refusing to watch");
        return Ok(report);
    };

    monitor::watch(
        &cfg.mapping.src_dir,
        &cfg.mapping.dst_dir,
        cfg.mapping.debounce_secs,
    )?;
    report.detail("watcher stopped");
    Ok(report)
}
