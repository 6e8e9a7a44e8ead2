//! Logging configuration and initialization
//!
//! Output goes either to stdout or to daily rotating files. Filtering follows
//! `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is unset or unparsable. Keeps driver chatter down.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Console,
    File { dir: PathBuf, prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub destination: LogDestination,
    pub ansi: bool,
}

impl LoggingConfig {
    /// Read the configuration from the environment.
    ///
    /// - `LOG_DESTINATION`: "console" (default) or "file"
    /// - `LOG_DIR`: directory for log files (default "./logs")
    /// - `LOG_FILE_PREFIX`: log file name prefix (default "progression")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let destination = match lookup("LOG_DESTINATION")
            .map(|value| value.to_lowercase())
            .as_deref()
        {
            Some("file") => LogDestination::File {
                dir: PathBuf::from(lookup("LOG_DIR").unwrap_or_else(|| "./logs".to_string())),
                prefix: lookup("LOG_FILE_PREFIX").unwrap_or_else(|| "progression".to_string()),
            },
            _ => LogDestination::Console,
        };
        let ansi = destination == LogDestination::Console;
        Self { destination, ansi }
    }
}

/// Keeps the background file writer alive. Dropping it flushes and stops file logging.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Initialise tracing from the environment.
pub fn init_logging() -> Result<LoggingGuard> {
    init_logging_with(LoggingConfig::from_env())
}

pub fn init_logging_with(config: LoggingConfig) -> Result<LoggingGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match config.destination {
        LogDestination::Console => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stdout)
                        .with_ansi(config.ansi)
                        .with_target(false),
                )
                .try_init()
                .map_err(|e| anyhow!("failed to initialize console tracing subscriber: {e}"))?;

            info!("Logging to console");
            Ok(LoggingGuard { _worker: None })
        }
        LogDestination::File { dir, prefix } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory '{}'", dir.display()))?;

            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, &prefix));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(false),
                )
                .try_init()
                .map_err(|e| anyhow!("failed to initialize file tracing subscriber: {e}"))?;

            info!(dir = %dir.display(), prefix = %prefix, "Logging to daily rotating files");
            Ok(LoggingGuard {
                _worker: Some(guard),
            })
        }
    }
}
