use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid scan_interval_ms: {0}. Must be at least 1")]
    InvalidScanInterval(u64),

    #[error("Invalid cooldown_period_ms: {0}. Must be at least 1")]
    InvalidCooldown(u64),

    #[error("Invalid max_recovery_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .drover/config.yaml (project config)
    /// 3. .drover/local.yaml (project local overrides, optional)
    /// 4. Environment variables (DROVER_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.drover/) so several
    /// instances can watch different project sets on one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".drover/config.yaml"))
            .merge(Yaml::file(".drover/local.yaml"))
            .merge(Env::prefixed("DROVER_").split("__"))
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
            .merge(Env::prefixed("DROVER_").split("__"))
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
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.recovery.scan_interval_ms == 0 {
            return Err(ConfigError::InvalidScanInterval(
                config.recovery.scan_interval_ms,
            ));
        }

        if config.recovery.max_recovery_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(
                config.recovery.max_recovery_attempts,
            ));
        }

        // A zero cooldown would mark every worker-active task stuck on every
        // sweep the moment its record is written.
        if config.recovery.cooldown_period_ms == 0 {
            return Err(ConfigError::InvalidCooldown(
                config.recovery.cooldown_period_ms,
            ));
        }

        let mut seen_paths = std::collections::HashSet::new();
        for project in &config.projects {
            if project.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Project name cannot be empty".to_string(),
                ));
            }
            if project.path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Project '{}' path cannot be empty",
                    project.name
                )));
            }
            // Two entries over one path would race last-writer-wins on the
            // same plan records.
            if !seen_paths.insert(&project.path) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Project '{}' duplicates path {}",
                    project.name,
                    project.path.display()
                )));
            }
        }

        Ok(())
    }
}
