//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use observability::LogFormat;
use std::path::PathBuf;

/// CDC Outbound - dispatch change notifications to an outbound destination
#[derive(Parser, Debug)]
#[command(
    name = "cdc-outbound",
    author,
    version,
    about = "Change-notification outbound dispatcher",
    long_about = "Routes, transforms and formats change notifications for an outbound \n\
                  destination (Kafka, Pulsar, JMS, Pub/Sub, ESP, Elasticsearch) and \n\
                  reports an outcome for every record."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CDC_OUTBOUND_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format: json, pretty or compact
    #[arg(
        long,
        default_value = "pretty",
        global = true,
        env = "CDC_OUTBOUND_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch the records of an NDJSON file
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "CDC_OUTBOUND_CONFIG"
    )]
    pub config: PathBuf,

    /// NDJSON file with one change notification per line
    #[arg(short, long, env = "CDC_OUTBOUND_INPUT")]
    pub input: PathBuf,

    /// Write dispatched records to this NDJSON file instead of the log
    #[arg(short, long, env = "CDC_OUTBOUND_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override the number of dispatch workers
    #[arg(long, env = "CDC_OUTBOUND_WORKERS")]
    pub workers: Option<usize>,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "CDC_OUTBOUND_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without dispatching
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CDC_OUTBOUND_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every registered stage name
    #[arg(long)]
    pub stages: bool,
}
