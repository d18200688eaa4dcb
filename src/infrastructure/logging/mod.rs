//! Logging setup using tracing.
//!
//! Stderr gets human (pretty) or JSON output per configuration; when a log
//! directory is configured, a daily-rotated JSON file layer is added on top.
//! `RUST_LOG` overrides the configured level.

use anyhow::Result;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::LoggingConfig;
use crate::infrastructure::config::ConfigError;

/// Initialize the global subscriber.
///
/// Returns the appender guard when file logging is enabled; the caller must
/// keep it alive for the process lifetime or buffered log lines are lost.
///
/// # Errors
///
/// Fails on an unknown level or format, or when the subscriber was already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let default_level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let stderr_layer = match config.format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        other => return Err(ConfigError::InvalidLogFormat(other.to_string()).into()),
    };

    let guard = if let Some(ref dir) = config.dir {
        let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, "drover.log"));
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_current_span(true)
            .with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()?;
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init()?;
        None
    };

    Ok(guard)
}

fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(ConfigError::InvalidLogLevel(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_levels() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("error").unwrap(), Level::ERROR);
    }

    #[test]
    fn test_parse_unknown_level_rejected() {
        assert!(matches!(
            parse_log_level("verbose"),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
