//! Video Frames Extractor Port - Rasterizes a video into timestamped images.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::conversation::CleanupObligation;
use crate::domain::foundation::StagingError;

/// Port for frame extraction.
///
/// Implementations must stop once `limit` frames exist or the video ends,
/// and must name files so that lexicographic order is capture order.
#[async_trait]
pub trait VideoFramesExtractor: Send + Sync {
    async fn extract(&self, request: &ExtractFramesRequest) -> Result<ExtractedFrames, StagingError>;
}

/// Parameters of one extraction run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractFramesRequest {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    /// Seconds between two frames. Must be positive.
    pub interval_secs: f64,
    /// Image file extension, e.g. `jpg`.
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub start_secs: Option<f64>,
    /// Exclusive end of the extracted range.
    pub end_secs: Option<f64>,
    pub limit: Option<usize>,
}

impl ExtractFramesRequest {
    pub fn new(input_file: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, interval_secs: f64) -> Self {
        Self {
            input_file: input_file.into(),
            output_dir: output_dir.into(),
            interval_secs,
            format: "jpg".to_string(),
            width: None,
            height: None,
            start_secs: None,
            end_secs: None,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Frames written by an extraction run.
#[derive(Debug)]
pub struct ExtractedFrames {
    /// File names under `output_dir`, in capture order.
    pub relative_paths: Vec<String>,
    /// Deletes the written files.
    pub cleanup: CleanupObligation,
}
