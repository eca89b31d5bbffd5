//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// power-stats - implementation market-share survey for storage miners
///
/// Surveys every miner registered on chain, probes each miner's node over
/// libp2p, and reports the share of quality-adjusted power run by the
/// venus implementation family versus lotus.
///
/// Examples:
///   power-stats --node ws://192.168.200.18:3453/rpc/v1
///   power-stats --node https://node.example.com/rpc/v1 --token <TOKEN>
///   power-stats --node ws://127.0.0.1:3453/rpc/v1 --concurrency 50 --format json
///   power-stats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Entry point of the full node, e.g. ws://192.168.200.18:3453/rpc/v1
    ///
    /// Websocket URLs are accepted and used over plain HTTP; every query
    /// is request/response.
    #[arg(
        short,
        long,
        value_name = "URL",
        required_unless_present = "init_config",
        env = "POWER_STATS_NODE"
    )]
    pub node: Option<String>,

    /// Bearer token for the node API
    #[arg(short, long, value_name = "TOKEN", env = "POWER_STATS_TOKEN")]
    pub token: Option<String>,

    /// Number of concurrent miner surveys in flight
    ///
    /// Defaults to 100 unless overridden here or in the config file.
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Per-call network timeout in seconds
    ///
    /// Bounds every chain query and peer handshake. Default: from config
    /// or 30s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Abort the whole run after this many seconds
    ///
    /// Outstanding miners are skipped and the report covers what finished.
    #[arg(long, value_name = "SECS")]
    pub run_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "error", value_name = "LEVEL")]
    pub log_level: String,

    /// Path to configuration file
    ///
    /// If not specified, looks for .power-stats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Generate a default .power-stats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref node) = self.node {
            let known_scheme = ["ws://", "wss://", "http://", "https://"]
                .iter()
                .any(|scheme| node.starts_with(scheme));
            if !known_scheme {
                return Err(
                    "Node URL must start with 'ws://', 'wss://', 'http://' or 'https://'"
                        .to_string(),
                );
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.run_timeout == Some(0) {
            return Err("Run timeout must be at least 1 second".to_string());
        }

        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(format!("Unknown log level: {}", self.log_level));
        }

        Ok(())
    }

    /// Returns the log level requested on the command line.
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::ERROR)
    }
}
