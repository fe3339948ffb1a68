mod error;

pub use error::ConfigError;

use crate::pipeline::EvictionPolicy;
use crate::source::{StartPosition, TailOptions};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:19901";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Server log to follow. Required, either here or on the command line.
    pub path: Option<PathBuf>,

    /// Read the whole file instead of starting at its end.
    #[serde(default)]
    pub from_start: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            from_start: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// e.g. "0.0.0.0:19901"
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Bounds on records that never become fully described. `0` disables a bound.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvictionConfig {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,

    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Lines between two eviction sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            max_records: default_max_records(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Append every fully described query as a JSON line to this file.
    pub completed_output: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_max_age_secs() -> u64 {
    3_600
}

fn default_max_records() -> usize {
    100_000
}

fn default_sweep_interval() -> u64 {
    1_000
}

impl ExporterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let cfg: Self = toml::from_str(&contents).map_err(|e| ConfigError::parse(path, e))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.is_none() {
            return Err(ConfigError::MissingLogPath);
        }

        if self.source.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.metrics.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListen {
                listen: self.metrics.listen.clone(),
            });
        }

        Ok(())
    }

    pub fn log_path(&self) -> Result<&Path, ConfigError> {
        self.source
            .path
            .as_deref()
            .ok_or(ConfigError::MissingLogPath)
    }

    pub fn tail_options(&self) -> TailOptions {
        TailOptions {
            start: if self.source.from_start {
                StartPosition::Beginning
            } else {
                StartPosition::End
            },
            poll_interval: Duration::from_millis(self.source.poll_interval_ms),
        }
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_age: (self.eviction.max_age_secs > 0)
                .then(|| Duration::from_secs(self.eviction.max_age_secs)),
            max_records: (self.eviction.max_records > 0).then_some(self.eviction.max_records),
            sweep_interval: self.eviction.sweep_interval.max(1),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.metrics.shutdown_grace_ms)
    }
}

impl FromStr for ExporterConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}
