//! CLI argument definitions for logsift-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logsift log-analytics daemon.
///
/// Streams log lines from the configured sources, parses them into
/// structured records, and feeds the windowed alert/stats consumers.
/// The process exits once every source has been fully consumed.
#[derive(Parser, Debug)]
#[command(name = "logsift-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the logsift.toml configuration file (required).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate the configuration file and exit without starting the pipeline.
    #[arg(long)]
    pub validate: bool,
}
