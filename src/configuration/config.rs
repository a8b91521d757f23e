use super::types::RetryPolicy;
use crate::error_handling::types::QueueError;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration.
///
/// Parsed either from command-line arguments (`clap`) or from a TOML file.
///
/// # Fields Overview
///
/// - `storage_path`: directory holding the durable artifact queue database
/// - `geo_timeout_ms`: upper bound on a single geolocation lookup; the
///   shutter path never waits longer than this
/// - `geo_max_age_ms`: a cached location fix younger than this is reused
///   instead of waking the location hardware again
/// - `acquire_max_attempts` / `acquire_backoff_ms`: bounded retry policy for
///   transient hardware acquisition failures
/// - `upload_max_attempts` / `upload_backoff_ms`: bounded retry policy for
///   per-artifact upload attempts during reconciliation
#[derive(Parser, Deserialize, Debug, Clone)]
#[command(name = "satchel")]
pub struct EngineConfig {
    /// Directory for the durable evidence queue.
    ///
    /// # Command Line
    /// Use `--storage-path <PATH>` to set this value from the CLI
    #[arg(long, default_value = ".")]
    pub storage_path: PathBuf,

    /// Geolocation lookup timeout in milliseconds. Must be at least 1.
    ///
    /// # Command Line
    /// Use `--geo-timeout-ms <MS>` to set this value from the CLI
    #[arg(long, default_value_t = 1_000, value_parser = clap::value_parser!(u64).range(1..))]
    #[serde(default = "default_geo_timeout_ms")]
    pub geo_timeout_ms: u64,

    /// Maximum age in milliseconds for reusing a cached location fix.
    ///
    /// # Command Line
    /// Use `--geo-max-age-ms <MS>` to set this value from the CLI
    #[arg(long, default_value_t = 30_000)]
    #[serde(default = "default_geo_max_age_ms")]
    pub geo_max_age_ms: u64,

    /// Hardware acquisition attempts (including the first). Must be at
    /// least 1.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    #[serde(default = "default_acquire_attempts")]
    pub acquire_max_attempts: u32,

    /// Base backoff between hardware acquisition attempts, milliseconds.
    #[arg(long, default_value_t = 250)]
    #[serde(default = "default_backoff_ms")]
    pub acquire_backoff_ms: u64,

    /// Upload attempts per artifact (including the first). Must be at
    /// least 1.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    #[serde(default = "default_upload_attempts")]
    pub upload_max_attempts: u32,

    /// Base backoff between upload attempts, milliseconds.
    #[arg(long, default_value_t = 250)]
    #[serde(default = "default_backoff_ms")]
    pub upload_backoff_ms: u64,
}

fn default_geo_timeout_ms() -> u64 {
    1_000
}
fn default_geo_max_age_ms() -> u64 {
    30_000
}
fn default_acquire_attempts() -> u32 {
    3
}
fn default_upload_attempts() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    250
}

impl EngineConfig {
    /// Parses the configuration from command-line arguments.
    pub fn from_args() -> Self {
        EngineConfig::parse()
    }

    /// Loads the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, QueueError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read config file {}: {}", path.display(), e);
            QueueError::ReadFailed
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|e| {
            log::error!("Failed to parse config file {}: {}", path.display(), e);
            QueueError::ReadFailed
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks for values a TOML file can set to anything. The CLI
    /// path enforces the same ranges through clap value parsers.
    fn validate(&self) -> Result<(), QueueError> {
        if self.geo_timeout_ms == 0 {
            log::error!("geo_timeout_ms must be at least 1");
            return Err(QueueError::ReadFailed);
        }
        if self.acquire_max_attempts == 0 || self.upload_max_attempts == 0 {
            log::error!("retry attempt counts must be at least 1");
            return Err(QueueError::ReadFailed);
        }
        Ok(())
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }

    pub fn geo_max_age(&self) -> Duration {
        Duration::from_millis(self.geo_max_age_ms)
    }

    pub fn acquire_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.acquire_max_attempts, self.acquire_backoff_ms)
    }

    pub fn upload_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.upload_max_attempts, self.upload_backoff_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("."),
            geo_timeout_ms: default_geo_timeout_ms(),
            geo_max_age_ms: default_geo_max_age_ms(),
            acquire_max_attempts: default_acquire_attempts(),
            acquire_backoff_ms: default_backoff_ms(),
            upload_max_attempts: default_upload_attempts(),
            upload_backoff_ms: default_backoff_ms(),
        }
    }
}
