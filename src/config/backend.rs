//! Chat backend configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Chat backend configuration
///
/// `kind` selects the backend; the remaining fields are read for it only.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Which backend to talk to
    pub kind: BackendKind,

    /// API key (OpenAI, Azure OpenAI or Gemini)
    pub api_key: String,

    /// Azure OpenAI endpoint; unset targets OpenAI directly (ChatGPT only)
    pub endpoint: Option<String>,

    /// Model name, or the Azure deployment name
    #[serde(default)]
    pub model: String,

    /// API version override (Azure OpenAI or Gemini)
    pub api_version: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Azure video retrieval index, used instead of frame extraction (ChatGPT only)
    pub video_index: Option<VideoIndexConfig>,
}

/// Backend discriminant
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    ChatGpt,
    Gemini,
}

/// Azure Computer Vision video retrieval index
#[derive(Debug, Clone, Deserialize)]
pub struct VideoIndexConfig {
    /// Computer Vision resource endpoint
    pub endpoint: String,

    /// Computer Vision API key
    pub api_key: String,

    /// Prefix of the per-conversation index name
    #[serde(default)]
    pub index_name_prefix: String,

    /// Delete the index when the conversation ends
    #[serde(default = "default_true")]
    pub delete_index_when_conversation_ends: bool,
}

impl BackendConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model name, defaulted per backend when left empty
    pub fn model(&self) -> &str {
        if !self.model.is_empty() {
            return &self.model;
        }
        match self.kind {
            BackendKind::ChatGpt => "gpt-4o",
            BackendKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// Validate backend configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BACKEND__API_KEY"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 600 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(index) = &self.video_index {
            if self.kind == BackendKind::Gemini {
                return Err(ValidationError::VideoIndexNotSupported);
            }
            if index.endpoint.trim().is_empty() {
                return Err(ValidationError::MissingRequired("BACKEND__VIDEO_INDEX__ENDPOINT"));
            }
            if index.api_key.trim().is_empty() {
                return Err(ValidationError::MissingRequired("BACKEND__VIDEO_INDEX__API_KEY"));
            }
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}
