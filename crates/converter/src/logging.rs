//! Process-wide log sink: console plus an append-only log file.
//!
//! Installed once by the binary. Everything else logs through the `tracing`
//! macros, which are safe to call from concurrent workers.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer alive; buffered lines are flushed when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber.
///
/// The console honors `RUST_LOG`, falling back to `default_level`. The file
/// always records at debug level, so per-file start/finish lines are kept
/// even when the console is quieter.
pub fn init_logging(log_file: &Path, default_level: LevelFilter) -> io::Result<LogGuard> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let console_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::DEBUG),
        )
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(LogGuard { _file: guard })
}
