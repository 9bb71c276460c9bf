//! # bizchat-logging
//!
//! Logging for the bizchat server.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured chat-turn event logging
//! - [`TurnEvent`] - Event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostics go through `tracing`; [`init_tracing`] installs the
//! subscriber, optionally mirroring it to a daily rolling file.

mod events;

pub use events::{LogFormat, Logger, TurnEvent};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the background file writer alive. Pending lines are flushed on drop.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialize tracing for the application.
///
/// `RUST_LOG` takes precedence over `level`. When `log_dir` is given, events
/// are also written as JSON to `bizchat.log` in that directory, rotated daily.
pub fn init_tracing(
    level: &str,
    format: LogFormat,
    log_dir: Option<&Path>,
) -> std::io::Result<Option<LoggingGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty | LogFormat::Compact => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "bizchat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(LoggingGuard { _guard: guard }))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}
