use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be between 1 and 10")]
    InvalidMaxWorkers(usize),

    #[error("Invalid max_turns: {0}. Must be at least 1")]
    InvalidMaxTurns(u32),

    #[error("Invalid call_timeout_secs: {0}. Must be positive")]
    InvalidCallTimeout(u64),

    #[error("Invalid significance_threshold: {0}. Must be within (0, 1)")]
    InvalidSignificanceThreshold(f64),

    #[error("Invalid practical_delta: {0}. Must be within [0, 1]")]
    InvalidPracticalDelta(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid llm primary: {0}. Must be one of: api, cli")]
    InvalidLlmPrimary(String),

    #[error("Invalid repetition_threshold: {0}. Must be at least 2")]
    InvalidRepetitionThreshold(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .patter/config.yaml (project config)
    /// 3. .patter/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PATTER_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.patter/) so multiple
    /// agent projects on one machine keep separate harness state.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".patter/config.yaml"))
            .merge(Yaml::file(".patter/local.yaml"))
            .merge(Env::prefixed("PATTER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.orchestrator.max_workers == 0 || config.orchestrator.max_workers > 10 {
            return Err(ConfigError::InvalidMaxWorkers(
                config.orchestrator.max_workers,
            ));
        }

        if config.runner.max_turns == 0 {
            return Err(ConfigError::InvalidMaxTurns(config.runner.max_turns));
        }
        if config.runner.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidCallTimeout(
                config.runner.call_timeout_secs,
            ));
        }

        if config.detector.repetition_threshold < 2 {
            return Err(ConfigError::InvalidRepetitionThreshold(
                config.detector.repetition_threshold,
            ));
        }

        let sig = config.experiment.significance_threshold;
        if sig <= 0.0 || sig >= 1.0 {
            return Err(ConfigError::InvalidSignificanceThreshold(sig));
        }
        let delta = config.experiment.practical_delta;
        if !(0.0..=1.0).contains(&delta) {
            return Err(ConfigError::InvalidPracticalDelta(delta));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_primaries = ["api", "cli"];
        if !valid_primaries.contains(&config.llm.primary.as_str()) {
            return Err(ConfigError::InvalidLlmPrimary(config.llm.primary.clone()));
        }

        Ok(())
    }
}
