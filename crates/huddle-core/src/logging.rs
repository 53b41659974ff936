//! Diagnostic logging setup.
//!
//! Logs go to stderr, or to a file when one is configured, filtered by
//! `HUDDLE_LOG` (same syntax as `RUST_LOG`, default `warn`). Answer output on
//! stdout is never touched.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "HUDDLE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Builds the filter from `HUDDLE_LOG`, falling back to `warn`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber.
///
/// With `log_file` the returned guard must be held until exit so buffered
/// lines are flushed.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(env_filter());

    let Some(path) = log_file else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
            .context("Failed to install logger")?;
        return Ok(None);
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Failed to install logger")?;
    Ok(Some(guard))
}
