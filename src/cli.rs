use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "launcher-query")]
#[command(about = "Rank launcher items against queries from the command line", long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep settings and activations in memory only
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Compact, global = true)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Compact,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the lines of a file and run queries against them
    Search {
        /// File with one item per line
        #[arg(short, long)]
        items: PathBuf,
        /// Accept matches within a bounded edit distance
        #[arg(short, long)]
        fuzzy: bool,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        /// Record an activation of the best match of each query
        #[arg(long)]
        activate: bool,
        queries: Vec<String>,
    },
    /// Print the load order of a plugin manifest
    Plugins {
        manifest: PathBuf,
    },
    /// Print activation counts per extension
    Stats {
        /// Only count activations of the last N days
        #[arg(long, default_value = "30")]
        days: u64,
    },
}
