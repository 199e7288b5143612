//! CLI argument parsing for batchsync

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bs")]
#[command(author, version, about = "Batch import of delimited files into a remote record store", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a file into the record store
    Import {
        #[command(flatten)]
        input: InputArgs,

        /// Write skipped and failed rows to this CSV file
        #[arg(short, long)]
        error_report: Option<PathBuf>,

        /// Write the run summary as JSON to this file
        #[arg(short, long)]
        summary_json: Option<PathBuf>,

        /// Write generated values (e.g. initial passwords) to this CSV file
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Suppress per-batch progress lines
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate a file without writing anything
    Check {
        #[command(flatten)]
        input: InputArgs,

        /// Write rejected rows to this CSV file
        #[arg(short, long)]
        error_report: Option<PathBuf>,
    },

    /// List available import profiles
    Profiles,
}

/// Input file, profile and run scope
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// CSV or TSV file to import
    #[arg(required = true)]
    pub file: PathBuf,

    /// Profile name or path to a profile YAML file
    #[arg(short, long)]
    pub profile: String,

    /// Scope value for profiles with a scope field (e.g. 2025-01-31)
    #[arg(long, conflicts_with_all = ["month", "year"])]
    pub scope: Option<String>,

    /// Month (1-12) whose last day is the scope value
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Year for --month
    #[arg(long, requires = "month")]
    pub year: Option<i32>,

    /// Restrict scope-restricted fields to this value (e.g. a branch id)
    #[arg(long)]
    pub caller_scope: Option<String>,
}
