use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{Cli, LogLevel};

pub const DEFAULT_MAX_DATA_POINTS: usize = 200;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const UNSUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("both endpoint and trading pairs are mandatory")]
    MissingEndpointOrPairs,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Feed WebSocket endpoint.
    pub endpoint: String,

    /// Pairs to subscribe to; one window each.
    pub trading_pairs: Vec<String>,

    pub log_level: LogLevel,

    /// Window capacity per pair.
    pub max_data_points: usize,

    /// `None` writes to stdout.
    pub output_file: Option<PathBuf>,

    /// Feed → engine channel capacity.
    ///
    /// Acts as backpressure: when the engine falls behind, the feed reader
    /// blocks instead of buffering without bound.
    pub channel_capacity: usize,

    pub json_logs: bool,

    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,

    /// Reply deadline for the unsubscribe sent on the way out.
    pub unsubscribe_timeout: Duration,

    /// How often the running counters are logged.
    pub stats_interval: Duration,
}

/// On-disk shape of `--config`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    trading_pairs: Vec<String>,
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    max_data_points: Option<usize>,
    #[serde(default)]
    output_file: Option<PathBuf>,
}

impl AppConfig {
    /// Build the run configuration from flags, or from the config file when
    /// `--config` is set.
    ///
    /// Returns the adjustments made along the way (fallback values) so the
    /// caller can log them once logging is up.
    pub fn resolve(cli: &Cli) -> Result<(Self, Vec<String>), ConfigError> {
        match &cli.config {
            Some(path) => Self::from_file(path, cli),
            None => Self::from_flags(cli),
        }
    }

    fn from_flags(cli: &Cli) -> Result<(Self, Vec<String>), ConfigError> {
        let mut warnings = Vec::new();

        let cfg = Self {
            endpoint: cli.endpoint.clone().unwrap_or_default(),
            trading_pairs: cli.pairs.clone(),
            log_level: cli.log_level,
            max_data_points: cli.max_data_points,
            output_file: cli.output.clone(),
            channel_capacity: cli.channel_capacity,
            json_logs: cli.json_logs,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            unsubscribe_timeout: UNSUBSCRIBE_TIMEOUT,
            stats_interval: STATS_INTERVAL,
        };

        let cfg = cfg.validated(&mut warnings)?;
        Ok((cfg, warnings))
    }

    fn from_file(path: &Path, cli: &Cli) -> Result<(Self, Vec<String>), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_config_file(file, cli)
    }

    fn from_config_file(file: ConfigFile, cli: &Cli) -> Result<(Self, Vec<String>), ConfigError> {
        let mut warnings = Vec::new();

        let log_level = match file.log_level.as_deref().map(str::trim) {
            None | Some("") => LogLevel::Info,
            Some(raw) => LogLevel::from_str(raw, true).unwrap_or_else(|_| {
                warnings.push(format!("unknown log level {raw:?}, using info"));
                LogLevel::Info
            }),
        };

        let cfg = Self {
            endpoint: file.endpoint,
            trading_pairs: file.trading_pairs,
            log_level,
            // a missing value goes through the same zero check as the flag
            max_data_points: file.max_data_points.unwrap_or(0),
            output_file: file.output_file,
            channel_capacity: cli.channel_capacity,
            json_logs: cli.json_logs,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            unsubscribe_timeout: UNSUBSCRIBE_TIMEOUT,
            stats_interval: STATS_INTERVAL,
        };

        let cfg = cfg.validated(&mut warnings)?;
        Ok((cfg, warnings))
    }

    fn validated(mut self, warnings: &mut Vec<String>) -> Result<Self, ConfigError> {
        self.endpoint = self.endpoint.trim().to_string();
        self.trading_pairs = self
            .trading_pairs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        if self.endpoint.is_empty() || self.trading_pairs.is_empty() {
            return Err(ConfigError::MissingEndpointOrPairs);
        }

        let mut seen = std::collections::HashSet::new();
        self.trading_pairs.retain(|p| seen.insert(p.clone()));

        if self.max_data_points == 0 {
            warnings.push(format!(
                "cannot set max data points to 0, using {DEFAULT_MAX_DATA_POINTS}"
            ));
            self.max_data_points = DEFAULT_MAX_DATA_POINTS;
        }

        if self.channel_capacity == 0 {
            warnings.push(format!(
                "cannot set channel capacity to 0, using {DEFAULT_CHANNEL_CAPACITY}"
            ));
            self.channel_capacity = DEFAULT_CHANNEL_CAPACITY;
        }

        Ok(self)
    }
}
