//! Structured logging.
//!
//! Console output is pretty-printed by default or JSON with `LOG_JSON=true`.
//! `LOG_FILE` adds a daily-rotated JSON file. Filtering follows `RUST_LOG`.
//!
//! ```bash
//! RUST_LOG=swap_event_sync=debug swap-event-sync watch
//! LOG_JSON=true LOG_FILE=./logs/sync.log swap-event-sync serve
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter: info for this crate, warn for dependencies.
pub const DEFAULT_FILTER: &str = "swap_event_sync=info,warn";

/// Build the env filter from `RUST_LOG`, then `log_level`, then [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter(log_level: Option<String>) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .or(log_level)
        .map_or_else(|| EnvFilter::new(DEFAULT_FILTER), EnvFilter::new)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for as long as file logging should flush;
/// dropping it stops the background writer.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .boxed()
    };

    let (file_layer, guard) = match log_file.as_deref() {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(
                dir,
                path.file_name().unwrap_or_else(|| OsStr::new("sync.log")),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(json_output, file_logging = log_file.is_some(), "Tracing initialized");
    Ok(guard)
}

/// Test-harness subscriber. Safe to call from every test.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
