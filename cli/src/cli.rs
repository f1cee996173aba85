use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Directive handed to the env filter.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "vwap", version, about = "Streaming volume-weighted average price per trading pair")]
pub struct Cli {
    /// WebSocket endpoint of the exchange feed
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Trading pairs to follow (comma-separated)
    #[clap(long, value_delimiter = ',')]
    pub pairs: Vec<String>,

    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// JSON configuration file. When set, replaces endpoint, pairs,
    /// log level, window size and output
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Append results to this file instead of stdout
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Number of trades in each pair's window
    #[clap(long, default_value_t = 200)]
    pub max_data_points: usize,

    /// Capacity of the channel between the feed and the engine
    #[clap(long, default_value_t = 1024)]
    pub channel_capacity: usize,

    /// Emit logs as JSON
    #[clap(long)]
    pub json_logs: bool,
}
