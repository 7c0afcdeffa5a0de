use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

const PROJECT_CONFIG: &str = ".driftscan/config.yaml";
const LOCAL_CONFIG: &str = ".driftscan/local.yaml";
const ENV_PREFIX: &str = "DRIFTSCAN_";

const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=256;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Rejected configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("scan.max_concurrency must be within 1..=256, got {0}")]
    InvalidMaxConcurrency(usize),

    #[error("retry.max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("retry.time_unit_ms must be positive, got {0}")]
    InvalidTimeUnit(u64),

    #[error("scan.timeout_secs must be positive when set, got {0}")]
    InvalidTimeout(u64),

    #[error("logging.level `{0}` is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Builds the scan [`Config`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the configuration of the current directory
    ///
    /// Later sources win:
    /// 1. built-in defaults
    /// 2. `.driftscan/config.yaml`
    /// 3. `.driftscan/local.yaml`
    /// 4. `DRIFTSCAN_*` variables, `__` separating nested keys
    ///    (`DRIFTSCAN_SCAN__MAX_CONCURRENCY=4`)
    pub fn load() -> Result<Config> {
        Self::extract(Self::figment(), "layered configuration")
    }

    /// Load defaults overridden by a single YAML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        Self::extract(
            Self::defaults().merge(Yaml::file(path)),
            &path.display().to_string(),
        )
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn figment() -> Figment {
        Self::defaults()
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment, source: &str) -> Result<Config> {
        let config: Config = figment
            .extract()
            .with_context(|| format!("invalid configuration in {source}"))?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let scan = &config.scan;
        if !CONCURRENCY_RANGE.contains(&scan.max_concurrency) {
            return Err(ConfigError::InvalidMaxConcurrency(scan.max_concurrency));
        }
        if let Some(0) = scan.timeout_secs {
            return Err(ConfigError::InvalidTimeout(0));
        }

        let retry = &config.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(retry.max_attempts));
        }
        if retry.time_unit_ms == 0 {
            return Err(ConfigError::InvalidTimeUnit(retry.time_unit_ms));
        }

        let level = config.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
