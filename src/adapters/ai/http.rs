//! Shared HTTP plumbing for vendor adapters.

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::foundation::{ApiError, ChatError, TransportErrorKind};

/// Maps a reqwest failure that produced no vendor response.
pub(crate) fn transport_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::transport(TransportErrorKind::Timeout, "Request timed out.")
    } else if e.is_connect() {
        ChatError::transport(TransportErrorKind::Connect, "Connection error.")
    } else if e.is_decode() {
        ChatError::parse(format!("Failed to parse response: {}", e))
    } else {
        ChatError::transport(TransportErrorKind::Other, e.to_string())
    }
}

/// Vendor error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Builds an [`ApiError`] from a failed response body.
///
/// OpenAI-family bodies carry a string `code`; Google bodies carry a numeric
/// `code` and a string `status` such as `RESOURCE_EXHAUSTED`.
pub(crate) fn api_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = match envelope.error.code {
                Some(serde_json::Value::String(code)) => Some(code),
                _ => envelope.error.status,
            };
            ApiError {
                status: Some(status),
                code,
                message: envelope.error.message.unwrap_or_else(|| body.to_string()),
            }
        }
        Err(_) => ApiError::new(status, body),
    }
}

/// Returns the response if successful, the vendor error otherwise.
pub(crate) async fn check_status(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Api(api_error(status.as_u16(), &body)))
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ChatError> {
    let response = check_status(response).await?;
    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text)
        .map_err(|e| ChatError::parse(format!("Failed to parse response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_error_body_keeps_string_code() {
        let body = r#"{"error":{"code":"TooManyRequests","message":"Rate limit is exceeded."}}"#;
        let err = api_error(429, body);
        assert_eq!(err.status, Some(429));
        assert_eq!(err.code.as_deref(), Some("TooManyRequests"));
        assert_eq!(err.message, "Rate limit is exceeded.");
    }

    #[test]
    fn google_error_body_uses_status_as_code() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        let err = api_error(503, body);
        assert_eq!(err.code.as_deref(), Some("UNAVAILABLE"));
        assert_eq!(err.message, "The model is overloaded.");
    }

    #[test]
    fn unparseable_body_becomes_message() {
        let err = api_error(502, "Bad Gateway");
        assert_eq!(err.code, None);
        assert_eq!(err.message, "Bad Gateway");
    }
}
