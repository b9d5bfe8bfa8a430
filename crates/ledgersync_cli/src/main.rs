//! LedgerSync CLI
//!
//! Command-line tools for inspecting device mutation logs.
//!
//! # Commands
//!
//! - `inspect` - Summarize a device mutation log (pending counts by kind)
//! - `dump` - Print unacknowledged mutations for debugging
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LedgerSync command-line tools.
#[derive(Parser)]
#[command(name = "ledgersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a device mutation log
    Inspect {
        /// Path to the mutation log file
        path: PathBuf,
    },

    /// Print unacknowledged mutations for debugging
    Dump {
        /// Path to the mutation log file
        path: PathBuf,

        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { path } => commands::inspect::run(&path)?,
        Commands::Dump {
            path,
            limit,
            format,
        } => commands::dump::run(&path, limit, &format)?,
        Commands::Version => {
            println!("LedgerSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
