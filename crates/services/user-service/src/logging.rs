//! Tracing bootstrap: a console layer plus a rolling log file.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use common::{AppError, AppResult};

/// Rotated files kept on disk, about one month of daily files
pub const MAX_LOG_FILES: usize = 30;

/// File name prefix for the active mode.
pub fn log_file_prefix(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "app"
    }
}

/// Rolling appender writing `<prefix>.<date>.log` under `directory`.
pub fn file_appender(directory: &Path, debug: bool) -> AppResult<RollingFileAppender> {
    std::fs::create_dir_all(directory).map_err(|e| {
        AppError::config(format!(
            "cannot create log directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_prefix(debug))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(directory)
        .map_err(|e| AppError::config(format!("cannot open log file: {}", e)))
}

/// Initialize the global subscriber.
///
/// Debug mode logs at `debug` with colors and source locations, production
/// logs plain text at `info`. `RUST_LOG` overrides the level in both. The
/// returned guard flushes the file writer when dropped, so keep it alive
/// for the whole process.
pub fn init_tracing(debug: bool, directory: &Path) -> AppResult<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(directory, debug)?);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(debug)
                .with_file(debug)
                .with_line_number(debug),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_file(debug)
                .with_line_number(debug),
        )
        .init();

    Ok(guard)
}
