//! Roster Command-Line Tool
//!
//! Export and restore collection snapshots and run the hierarchy migration.

mod commands;
mod formatter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use tracing_subscriber::EnvFilter;

/// Roster Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(version, about = "Backup, restore and hierarchy migration for Roster stores")]
pub struct Args {
    /// Path to the document store.
    #[arg(short = 'd', long, global = true)]
    pub data_path: Option<PathBuf>,

    /// Whole-run deadline in seconds. 0 disables it.
    #[arg(long, global = true, default_value_t = 0)]
    pub timeout_secs: u64,

    /// Output format
    #[arg(long, global = true, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Snapshot collections into a new timestamped run directory.
    Export(commands::ExportArgs),
    /// Load a run directory back into the store. Dry run unless --live.
    Restore(commands::RestoreArgs),
    /// Rewrite ownership links into the SuperAdmin > Admin > member hierarchy.
    Migrate(commands::MigrateArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roster=info,roster_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match commands::run(args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
