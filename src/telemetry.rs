//! Tracing initialization for applications embedding the engine.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the binary. [`init_tracing`] is a convenience for callers that
//! don't have their own.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("failed to initialize tracing: {0}")]
    Init(String),
}

/// Initializes the global tracing subscriber.
///
/// `filter` takes precedence over `RUST_LOG`; with neither set the level is
/// `info`. Fails if a global subscriber is already installed.
///
/// ```bash
/// RUST_LOG=chat_about_video=debug my-app
/// ```
pub fn init_tracing(filter: Option<&str>, format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter = create_env_filter(filter)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

fn create_env_filter(filter: Option<&str>) -> Result<EnvFilter, TelemetryError> {
    match filter {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info")),
    }
    .map_err(|e| TelemetryError::InvalidFilter(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_is_parsed() {
        assert!(create_env_filter(Some("chat_about_video=debug,info")).is_ok());
    }

    #[test]
    fn malformed_filter_is_rejected() {
        assert!(matches!(
            create_env_filter(Some("chat_about_video=loud")),
            Err(TelemetryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn second_init_fails() {
        // The first call may lose to another test; the second can never succeed.
        let _ = init_tracing(Some("warn"), LogFormat::Text);
        assert!(matches!(
            init_tracing(Some("warn"), LogFormat::Json),
            Err(TelemetryError::Init(_))
        ));
    }
}
