//! Error types for the conversation engine.

use std::fmt;
use thiserror::Error;

use super::ConversationId;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure classes that drive independent retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The remote API signaled rate limiting.
    Throttling,
    /// The remote API failed with a transient 5xx-class error.
    Server,
    /// Local transport failure (timeout, connection reset).
    Connectivity,
    /// The remote model could not fetch a staged media URL.
    Download,
}

impl ErrorClass {
    /// All classes, in classification precedence order.
    pub const ALL: [ErrorClass; 4] = [
        ErrorClass::Throttling,
        ErrorClass::Server,
        ErrorClass::Connectivity,
        ErrorClass::Download,
    ];
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Throttling => "throttling",
            ErrorClass::Server => "server",
            ErrorClass::Connectivity => "connectivity",
            ErrorClass::Download => "download",
        };
        write!(f, "{}", s)
    }
}

/// A rejection reported by a vendor API.
///
/// This is the normalized shape the classification predicates inspect:
/// the HTTP status (when one was received), the vendor's error code and
/// its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code of the failed response.
    pub status: Option<u16>,
    /// Vendor error code (e.g. `TooManyRequests`, `RESOURCE_EXHAUSTED`).
    pub code: Option<String>,
    /// Vendor error message.
    pub message: String,
}

impl ApiError {
    /// Creates an API error from a status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// Sets the vendor error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{} {}: {}", status, code, self.message),
            (Some(status), None) => write!(f, "{} {}", status, self.message),
            (None, Some(code)) => write!(f, "{}: {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// Kind of local transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request timed out.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// Any other transport failure (reset, broken body, ...).
    Other,
}

/// A transport-level failure that happened before a vendor response was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Frame extraction, upload or indexing failed outright.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StagingError {
    #[error("frame extraction failed: {0}")]
    Extraction(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("video indexing failed: {0}")]
    Indexing(String),

    #[error("cannot read media file {path}: {reason}")]
    Read { path: String, reason: String },
}

impl StagingError {
    /// Creates a frame extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Creates an upload error.
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload(message.into())
    }

    /// Creates a video indexing error.
    pub fn indexing(message: impl Into<String>) -> Self {
        Self::Indexing(message.into())
    }

    /// Creates a media read error.
    pub fn read(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A cleanup obligation failed to undo its staging side effect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cleanup '{label}' failed: {message}")]
pub struct CleanupError {
    pub label: String,
    pub message: String,
}

impl CleanupError {
    /// Creates a cleanup error.
    pub fn new(label: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            label: label.into(),
            message: message.to_string(),
        }
    }
}

/// Errors surfaced by the conversation engine and backend adapters.
///
/// Vendor and transport failures are carried unchanged so callers can see
/// exactly what the remote side reported; whether they are throttling,
/// server, connectivity or download failures is decided by the backend's
/// classification predicates.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Contradictory or insufficient options. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Frame extraction, upload or indexing failed.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The vendor API rejected the request.
    #[error("API error: {0}")]
    Api(ApiError),

    /// The request never produced a vendor response.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// The vendor response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// `say()` was called after `end()`.
    #[error("conversation {0} has already ended")]
    ConversationEnded(ConversationId),
}

impl ChatError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an API error from a status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api(ApiError::new(status, message))
    }

    /// Creates a transport error.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport(TransportError::new(kind, message))
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns the vendor error, if this is one.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the transport error, if this is one.
    pub fn as_transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status of a vendor rejection.
    pub fn status(&self) -> Option<u16> {
        self.as_api_error().and_then(|e| e.status)
    }

    /// Returns the message reported by the vendor or transport layer.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Api(err) => Some(&err.message),
            Self::Transport(err) => Some(&err.message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status_and_code() {
        let err = ApiError::new(429, "Rate limit reached").with_code("TooManyRequests");
        assert_eq!(err.to_string(), "429 TooManyRequests: Rate limit reached");
    }

    #[test]
    fn api_error_display_without_code() {
        let err = ApiError::new(500, "boom");
        assert_eq!(err.to_string(), "500 boom");
    }

    #[test]
    fn staging_error_converts_into_chat_error() {
        let err: ChatError = StagingError::upload("bucket rejected").into();
        assert!(matches!(err, ChatError::Staging(StagingError::Upload(_))));
        assert_eq!(err.to_string(), "upload failed: bucket rejected");
    }

    #[test]
    fn chat_error_accessors() {
        let err = ChatError::api(503, "Service Unavailable");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.message(), Some("Service Unavailable"));
        assert!(err.as_transport_error().is_none());

        let err = ChatError::transport(TransportErrorKind::Timeout, "Request timed out.");
        assert_eq!(err.status(), None);
        assert_eq!(err.message(), Some("Request timed out."));
    }

    #[test]
    fn conversation_ended_names_conversation() {
        let id = ConversationId::from_string("abc").unwrap();
        let err = ChatError::ConversationEnded(id);
        assert_eq!(err.to_string(), "conversation abc has already ended");
    }

    #[test]
    fn validation_error_display() {
        assert_eq!(
            ValidationError::empty_field("conversation_id").to_string(),
            "Field 'conversation_id' cannot be empty"
        );
        assert_eq!(
            ValidationError::invalid_format("conversation_id", "bad").to_string(),
            "Field 'conversation_id' has invalid format: bad"
        );
    }

    #[test]
    fn error_class_display() {
        assert_eq!(ErrorClass::Throttling.to_string(), "throttling");
        assert_eq!(ErrorClass::Download.to_string(), "download");
    }

    #[test]
    fn cleanup_error_display() {
        let err = CleanupError::new("delete frames", "permission denied");
        assert_eq!(err.to_string(), "cleanup 'delete frames' failed: permission denied");
    }
}
