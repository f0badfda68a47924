use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize the tracing subscriber. `RUST_LOG` wins over the CLI flags.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_directive = if verbose {
        "avcurator=debug"
    } else {
        "avcurator=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .context("failed to build log filter")?;

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let fmt_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        None => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact();
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    Ok(())
}
