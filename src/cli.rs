use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};
use crate::config;

#[derive(Debug, Parser)]
#[command(
    name = "avcurator",
    version,
    about = "Archive and mapping reconciliation for a curated video library"
)]
pub struct Cli {
    /// Path to the config file (overrides AVC_CONFIG_PATH).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Append logs to a file instead of stderr.
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Emit the command report as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the intake-to-library archive pass over the configured routes.
    Archive {
        /// Process only this route (intake subdirectory name).
        #[arg(long)]
        route: Option<String>,

        /// Report what would change without touching anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one pointer-tree mapping sync.
    Mapping,
    /// Watch the pointer tree and sync after each burst of changes.
    MappingWatch,
    /// Concatenate multi-part titles found under SEARCH_DIR into DST_DIR.
    Merge {
        /// Directory to scan, relative to the mapping source tree.
        search_dir: PathBuf,

        /// Directory the merged files land in.
        dst_dir: PathBuf,

        /// Only merge identifiers matching this regex.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Check the configured directories and tools without changing anything.
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for detail in &report.details {
        println!("{detail}");
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let cfg = config::load_config(cli.config.as_deref())?;

    let report = match &cli.command {
        Commands::Archive { route, dry_run } => {
            commands::archive::run(&cfg, route.as_deref(), *dry_run)?
        }
        Commands::Mapping => commands::mapping::run(&cfg)?,
        Commands::MappingWatch => commands::mapping_watch::run(&cfg)?,
        Commands::Merge {
            search_dir,
            dst_dir,
            filter,
        } => commands::merge::run(&cfg, search_dir, dst_dir, filter.as_deref())?,
        Commands::Status => commands::status::run(&cfg)?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
