//! The two log sinks: informational events go to stdout, warnings and errors
//! to stderr. Both are written from a background thread.

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::prelude::*;

/// Keeps the writer threads alive; dropping it flushes both sinks.
pub struct Guards {
    _info: WorkerGuard,
    _error: WorkerGuard,
}

fn is_error(level: &Level) -> bool {
    *level <= Level::WARN
}

/// Raises `level` by one step per `-v` flag, up to trace.
pub fn verbosity(level: Level, verbose: u8) -> Level {
    const LEVELS: [Level; 5] = [
        Level::ERROR,
        Level::WARN,
        Level::INFO,
        Level::DEBUG,
        Level::TRACE,
    ];

    let current = LEVELS.iter().position(|l| *l == level).unwrap_or(2);
    LEVELS[(current + verbose as usize).min(LEVELS.len() - 1)]
}

pub fn init(level: Level) -> Result<Guards, tracing::subscriber::SetGlobalDefaultError> {
    let (info_writer, info) = tracing_appender::non_blocking(std::io::stdout());
    let (error_writer, error) = tracing_appender::non_blocking(std::io::stderr());

    let info_sink = tracing_subscriber::fmt::layer()
        .with_writer(info_writer)
        .with_ansi(false)
        .with_filter(filter_fn(|metadata| !is_error(metadata.level())));

    let error_sink = tracing_subscriber::fmt::layer()
        .with_writer(error_writer)
        .with_ansi(false)
        .with_filter(filter_fn(|metadata| is_error(metadata.level())));

    let subscriber = tracing_subscriber::registry()
        .with(info_sink)
        .with(error_sink)
        .with(LevelFilter::from_level(level));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(Guards {
        _info: info,
        _error: error,
    })
}
