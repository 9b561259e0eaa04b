//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Frame interval must be positive")]
    InvalidFrameInterval,

    #[error("Frame limit must be at least 1")]
    InvalidFrameLimit,

    #[error("Storage backend '{0}' is not compiled in (enable the '{0}' feature)")]
    StorageBackendUnavailable(&'static str),

    #[error("Gemini does not support video retrieval indexes")]
    VideoIndexNotSupported,
}
