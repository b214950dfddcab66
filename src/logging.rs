//! Diagnostic log output.
//!
//! Every event goes to a daily file under `<data dir>/logs`. Debug builds also
//! print to stderr; stdout belongs to command output.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::storage::default_data_dir;

/// Filter override, read before `RUST_LOG`
pub const LOG_FILTER_ENV: &str = "LOLSTATS_LOG";

#[cfg(debug_assertions)]
const DEFAULT_DIRECTIVES: &str = "debug,hyper=warn,reqwest=warn";
#[cfg(not(debug_assertions))]
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn";

/// Flushes buffered log lines when dropped. Hold it until the process exits.
#[must_use]
pub struct LogGuard {
    _writer: WorkerGuard,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot open log file in {dir:?}: {source}")]
    File {
        dir: PathBuf,
        #[source]
        source: InitError,
    },

    #[error("A log subscriber is already installed")]
    AlreadyInstalled,
}

/// Install the global subscriber, keeping log files beneath `data_dir`
/// (or the platform data directory when none is configured)
pub fn init(data_dir: Option<&Path>) -> Result<LogGuard, LoggingError> {
    let log_dir = match data_dir {
        Some(dir) => log_directory(dir),
        None => log_directory(&default_data_dir()),
    };
    let (writer, guard) = tracing_appender::non_blocking(file_appender(&log_dir)?);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    #[cfg(debug_assertions)]
    let console_layer = Some(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .pretty(),
    );

    #[cfg(not(debug_assertions))]
    let console_layer: Option<fmt::Layer<_>> = None;

    let subscriber = tracing_subscriber::registry()
        .with(filter())
        .with(file_layer)
        .with(console_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    Ok(LogGuard { _writer: guard })
}

/// Log directory beneath a data directory
pub fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("lolstats")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|source| LoggingError::File {
            dir: log_dir.to_path_buf(),
            source,
        })
}
