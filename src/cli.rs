//! CLI argument parsing for the syncro-import binary.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

use crate::defaults::{DEFAULT_TIME_ENTRY_TICKETS, MAX_TIME_ENTRY_TICKETS};

#[derive(Parser)]
#[command(
    name = "syncro-import",
    version,
    about = "Import tickets and comments from CSV into Syncro"
)]
pub struct Cli {
    /// Ignore the saved entity cache and enumerate everything again
    #[arg(long, global = true)]
    pub refresh_cache: bool,

    /// Write the run summary as JSON to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create tickets from the tickets CSV
    Tickets {
        /// CSV file (default: TICKETS_CSV_PATH or tickets.csv)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Add comments to existing tickets from the comments CSV
    Comments {
        /// CSV file (default: COMMENTS_CSV_PATH or ticket_comments.csv)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Create tickets with their follow-up comments from one combined CSV
    Combined {
        /// CSV file (default: COMBINED_CSV_PATH or tickets_and_comments_combined.csv)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Log labor time on existing tickets from the ticket labor CSV
    Labor {
        /// CSV file (default: LABOR_CSV_PATH or ticket_labor_entries.csv)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Log generated labor time against the most recent tickets
    TimerEntries {
        /// Number of recent tickets
        #[arg(
            long,
            default_value_t = DEFAULT_TIME_ENTRY_TICKETS,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_TIME_ENTRY_TICKETS)
        )]
        count: usize,
        /// Tech to log the time as (default: TIMER_TECH)
        #[arg(long)]
        tech: Option<String>,
        /// Labor product name (default: TIMER_LABOR_PRODUCT)
        #[arg(long)]
        product: Option<String>,
    },
    /// Delete the saved entity cache file
    ClearCache,
}
