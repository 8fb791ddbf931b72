//! Logging infrastructure for gpstrail.
//!
//! Structured `tracing` output to two sinks:
//! - a session log file (`logs/gpstrail.log` by default), truncated when
//!   logging starts and written through a non-blocking appender
//! - stdout with ANSI colors
//!
//! The level filter defaults to `info` and follows `RUST_LOG` when set, e.g.
//! `RUST_LOG=gpstrail=debug` to see per-fix ingestion and the periodic
//! window logger.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the session log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be truncated. Panics are avoided, but calling this twice in one
/// process fails inside `tracing_subscriber` because the global default can
/// only be set once.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    let path = prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    info!(path = %path.display(), "Logging initialized");

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// Create `log_dir` if needed and truncate the session log file.
pub(crate) fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}

/// Default log directory, relative to the working directory.
pub fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Default log file name.
pub fn default_log_file() -> &'static str {
    "gpstrail.log"
}
