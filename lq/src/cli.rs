//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lookupq - rate-limited person API lookups
#[derive(Parser)]
#[command(
    name = "lq",
    about = "Submit email addresses to the person API under its rate limit",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up every new item in the input file
    Run {
        /// Newline-delimited JSON work items ({"id", "dt", "email"})
        #[arg(short, long)]
        input: PathBuf,

        /// Processed-history file to dedupe against and append to
        #[arg(long)]
        history: Option<PathBuf>,

        /// Only process a random sample of this many items
        #[arg(short, long)]
        sample: Option<usize>,

        /// Log releases instead of calling the API
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the staged schedule without dispatching anything
    Plan {
        /// Newline-delimited JSON work items ({"id", "dt", "email"})
        #[arg(short, long)]
        input: PathBuf,

        /// Processed-history file to dedupe against
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}
