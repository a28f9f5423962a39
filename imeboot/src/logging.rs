//! Diagnostics setup.
//!
//! Installs the global `tracing` subscriber: a compact stderr layer and, when
//! a log directory is configured, a JSON layer written to daily-rotated files
//! through a non-blocking writer.

use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::app::{BootError, BootResult, LoggingConfig};

/// Environment variable overriding the configured filter.
pub const LOG_ENV_VAR: &str = "IMEBOOT_LOG";

/// Keeps the non-blocking log writer alive. Dropping it flushes pending
/// lines.
#[derive(Debug)]
pub struct LoggingGuard {
    log_dir: Option<PathBuf>,
    level: String,
    _worker: Option<WorkerGuard>,
}

impl LoggingGuard {
    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }

    pub fn level(&self) -> &str {
        &self.level
    }
}

/// Resolve the filter directive: `IMEBOOT_LOG` wins over the configured
/// level when it parses.
pub fn resolve_log_level(config: &LoggingConfig) -> String {
    std::env::var(LOG_ENV_VAR)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && EnvFilter::try_new(v).is_ok())
        .unwrap_or_else(|| config.level.clone())
}

/// Install the global subscriber.
///
/// If a subscriber is already installed it is left in place and only the
/// guard is returned.
pub fn init_logging(config: &LoggingConfig) -> BootResult<LoggingGuard> {
    let level = resolve_log_level(config);
    let filter = EnvFilter::try_new(&level)
        .map_err(|e| BootError::Logging(format!("invalid filter '{}': {}", level, e)))?;

    let (file_writer, worker) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| BootError::io(dir, e))?;
            let appender = RollingBuilder::new()
                .rotation(Rotation::DAILY)
                .filename_prefix("imeboot")
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| BootError::Logging(e.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    if !tracing::dispatcher::has_been_set() {
        let file_layer = file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_current_span(false)
                .with_span_list(false)
        });
        let stderr_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
            .map_err(|e| BootError::Logging(e.to_string()))?;
    }

    Ok(LoggingGuard {
        log_dir: config.directory.clone(),
        level,
        _worker: worker,
    })
}

/// Report a warning before (or without) a subscriber.
pub fn warn_fallback(message: &str) {
    if tracing::dispatcher::has_been_set() {
        tracing::warn!(event = "bootstrap_warning", message);
        return;
    }
    eprintln!("{}", message);
}
