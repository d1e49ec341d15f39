use crate::config::StorageBackend;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the Eat-Poop-Sleep tracker backend.
#[derive(Debug, Parser)]
#[command(author, version, about = "Baby log aggregator with daily email summaries", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (defaults to ./eps-tracker.toml if present).
    #[arg(long, value_name = "FILE")]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service and the in-process daily trigger.
    Serve {
        /// Event store to use instead of the configured one.
        #[arg(long, value_enum)]
        backend: Option<StorageBackend>,
    },
    /// Email one day's summary and exit; meant for cron or CI schedulers.
    SendDaily {
        /// Day to summarize (YYYY-MM-DD), today when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Event store to read, firestore when omitted.
        #[arg(long, value_enum)]
        backend: Option<StorageBackend>,
        /// Print the summary instead of sending it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print one day's summary to stdout.
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum)]
        backend: Option<StorageBackend>,
    },
    /// Dump every stored event as CSV.
    ExportCsv {
        /// Output file, stdout when omitted.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        backend: Option<StorageBackend>,
    },
}
