//! Structured logging setup.
//!
//! `tracing` events from every module go through one subscriber built here:
//! an [`EnvFilter`] (`RUST_LOG` wins over `JOLT_LOG_LEVEL`) and a JSON or
//! pretty fmt layer, optionally written through `tracing_appender`'s
//! non-blocking worker.
//!
//! | Variable | Default |
//! |---|---|
//! | `JOLT_LOG_LEVEL` | `info` |
//! | `JOLT_LOG_FORMAT` | `pretty` (`json` for machine output) |
//! | `JOLT_LOG_ASYNC` | `false` |
//! | `JOLT_LOG_TARGET_FILTER` | none, comma separated directives |
//! | `JOLT_LOG_INCLUDE_LOCATION` | `false` |

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub async_logging: bool,
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<bool>().ok())
                .unwrap_or(false)
        };
        Self {
            log_level: lookup("JOLT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(&lookup("JOLT_LOG_FORMAT").unwrap_or_default()),
            async_logging: flag("JOLT_LOG_ASYNC"),
            target_filter: lookup("JOLT_LOG_TARGET_FILTER"),
            include_location: flag("JOLT_LOG_INCLUDE_LOCATION"),
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));

        // client disconnects are reported by may_minihttp at info
        if let Ok(directive) = "may_minihttp=warn".parse() {
            filter = filter.add_directive(directive);
        }

        if let Some(target_filter) = &self.target_filter {
            for item in target_filter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match item.parse() {
                    Ok(directive) => filter = filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {item}"),
                }
            }
        }
        filter
    }
}

/// Keeps the non-blocking writer flushing; hold it for the process lifetime.
#[must_use = "dropping the guard stops the async log writer"]
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<LogGuard> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (BoxMakeWriter::new(writer), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(LogGuard { _guard: guard })
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`].
pub fn init_logging() -> Result<LogGuard> {
    init_logging_with_config(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lookup_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_from_lookup_values() {
        let config = LogConfig::from_lookup(|key| match key {
            "JOLT_LOG_LEVEL" => Some("debug".into()),
            "JOLT_LOG_FORMAT" => Some("JSON".into()),
            "JOLT_LOG_ASYNC" => Some("true".into()),
            "JOLT_LOG_TARGET_FILTER" => Some("jolt::resource=trace".into()),
            _ => None,
        });
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level(), Level::DEBUG);
        assert!(config.async_logging);
        assert!(!config.include_location);
        assert_eq!(config.target_filter.as_deref(), Some("jolt::resource=trace"));
    }
}
