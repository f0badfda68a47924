use anyhow::Result;

use crate::commands::CommandReport;
use crate::config::CuratorConfig;

/// Report on the configured environment without touching anything:
/// which routes exist on disk, whether the mapping trees are present,
/// and whether ffmpeg can be found.
pub fn run(cfg: &CuratorConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("status");

    report.detail(format!("state dir: {}", cfg.state_dir.display()));
    report.detail(format!("routes configured: {}", cfg.archive.routes.len()));
    for (src, route) in &cfg.archive.routes {
        let src_path = cfg.archive.src_dir.join(src);
        let dst_path = cfg.archive.dst_dir.join(route.dst());
        if src_path.is_dir() {
            report.detail(format!("route {src} -> {}", route.dst()));
        } else {
            report.issue(format!(
                "route {src}: source missing: {}",
                src_path.display()
            ));
        }
        if !dst_path.is_dir() {
            report.detail(format!(
                "route {src}: destination will be created: {}",
                dst_path.display()
            ));
        }
    }

    if cfg.mapping.src_dir.is_dir() {
        report.detail(format!(
            "mapping source: {}",
            cfg.mapping.src_dir.display()
        ));
    } else {
        report.issue(format!(
            "mapping source missing: {}",
            cfg.mapping.src_dir.display()
        ));
    }
    report.detail(format!(
        "mapping destination: {}",
        cfg.mapping.dst_dir.display()
    ));

    match which::which(&cfg.merge.ffmpeg_bin) {
        Ok(path) => report.detail(format!("ffmpeg: {}", path.display())),
        Err(_) if cfg.merge.ffmpeg_bin.exists() => {
            report.detail(format!("ffmpeg: {}", cfg.merge.ffmpeg_bin.display()));
        }
        Err(_) => report.issue(format!(
            "ffmpeg not found: {}",
            cfg.merge.ffmpeg_bin.display()
        )),
    }

    Ok(report)
}
