//! CLI argument definitions for ironwall-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Ironwall threat detection and blocking daemon.
///
/// Reads newline-delimited JSON packet records, classifies each one and
/// blocks sources judged to be attacking.
#[derive(Parser, Debug)]
#[command(name = "ironwall-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to ironwall.toml configuration file.
    ///
    /// Built-in defaults (plus environment overrides) are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override filter backend (iptables, simulated).
    #[arg(long)]
    pub backend: Option<String>,

    /// Validate configuration and exit without processing packets.
    #[arg(long)]
    pub validate: bool,

    /// Packet record input: a file path, or "-" for stdin.
    #[arg(short, long, default_value = "-")]
    pub input: String,

    /// Keep waiting for new records at end of input instead of exiting.
    #[arg(long)]
    pub follow: bool,

    /// Leave installed block rules in place on exit.
    #[arg(long)]
    pub keep_blocks: bool,
}
