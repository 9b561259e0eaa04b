//! Frame extraction configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Frame extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FramesConfig {
    /// Seconds between two extracted frames
    #[serde(default = "default_interval")]
    pub interval_secs: f64,

    /// Maximum frames per video
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Frame width in pixels; unset keeps the source width
    #[serde(default = "default_width")]
    pub width: Option<u32>,

    /// Frame height in pixels; unset keeps the source height
    pub height: Option<u32>,

    /// Image format / file extension
    #[serde(default = "default_format")]
    pub format: String,

    /// ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Delete extracted frames when the conversation ends
    #[serde(default = "default_true")]
    pub delete_files_when_conversation_ends: bool,
}

impl FramesConfig {
    /// Validate frame extraction configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.interval_secs > 0.0) {
            return Err(ValidationError::InvalidFrameInterval);
        }
        if self.limit == 0 {
            return Err(ValidationError::InvalidFrameLimit);
        }
        Ok(())
    }
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            limit: default_limit(),
            width: default_width(),
            height: None,
            format: default_format(),
            ffmpeg_path: default_ffmpeg_path(),
            delete_files_when_conversation_ends: true,
        }
    }
}

fn default_interval() -> f64 {
    5.0
}

fn default_limit() -> usize {
    10
}

fn default_width() -> Option<u32> {
    Some(200)
}

fn default_format() -> String {
    "jpg".to_string()
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_true() -> bool {
    true
}
