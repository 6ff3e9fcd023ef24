//! Structured logging.
//!
//! Installs the global `tracing` subscriber. Formatted lines go to the
//! rotation-aware [`LogSink`]; the level comes from settings unless
//! `RUST_LOG` overrides it.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::sink::LogSink;

/// Install the global subscriber writing to `sink`.
///
/// An unparseable `log_level` falls back to `info` with a warning.
pub fn init_logging(
    log_level: &str,
    sink: LogSink,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let (level, invalid) = match parse_level(log_level) {
        Some(level) => (level, false),
        None => (Level::INFO, true),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(sink))
        .try_init()?;

    if invalid {
        tracing::warn!(log_level = %log_level, "Invalid log level, using info");
    }
    tracing::debug!("Log opened");
    Ok(())
}

fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        other => other.parse().ok(),
    }
}
