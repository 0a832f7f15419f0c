//! Logging
//!
//! Composes the tracing subscriber once at startup: console output, an
//! optional rolling log file, and a capture layer feeding the in-memory
//! history served by `/logs`.

mod buffer;
mod layer;

pub use buffer::{DEFAULT_HISTORY_CAPACITY, LogBuffer, LogEntry, LogLevel};
pub use layer::LogCaptureLayer;

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Protocol client chatter stays out of the console and the `/logs` history.
const QUIET_TARGETS: &str = "hyper=warn,reqwest=warn,whatsapp_rust=warn,wacore=warn";

fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!("{level},{QUIET_TARGETS}")
}

/// Install the global subscriber and return the history buffer it feeds.
///
/// The returned guard must be held for the lifetime of the process when a
/// log directory is configured, otherwise buffered file output is lost.
pub fn init(config: &LoggingConfig) -> anyhow::Result<(LogBuffer, Option<WorkerGuard>)> {
    let buffer = LogBuffer::new(config.history_capacity);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.debug)));

    let console = if config.json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "wa-capture.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .with(LogCaptureLayer::new(buffer.clone()))
        .try_init()?;

    Ok((buffer, guard))
}
