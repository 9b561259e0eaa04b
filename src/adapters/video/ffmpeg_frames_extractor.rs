//! FFmpeg frames extractor.
//!
//! Seeks to each timestamp and writes one frame per ffmpeg run. Runs stop
//! at the frame limit, at the configured end, or when ffmpeg reports that
//! the seek landed past the end of the video.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::conversation::CleanupObligation;
use crate::domain::foundation::{CleanupError, StagingError};
use crate::ports::{ExtractFramesRequest, ExtractedFrames, VideoFramesExtractor};

/// ffmpeg's message when the seek position is past the end of the input.
const PAST_END_MESSAGE: &str = "Output file is empty, nothing was encoded";

/// File name of the frame captured at `secs`; zero padded so that
/// lexicographic order is capture order.
pub fn frame_file_name(secs: f64, format: &str) -> String {
    format!("{:010.3}.{}", secs, format)
}

/// Extracts frames with the `ffmpeg` command line tool.
#[derive(Debug, Clone)]
pub struct FfmpegFramesExtractor {
    ffmpeg_path: PathBuf,
    frame_timeout: Duration,
}

impl Default for FfmpegFramesExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFramesExtractor {
    /// Uses `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            frame_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Upper bound for a single ffmpeg run.
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Arguments of the ffmpeg run that captures the frame at `secs`.
    pub fn frame_args(request: &ExtractFramesRequest, secs: f64, output_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-accurate_seek".into(),
            "-ss".into(),
            secs.to_string().into(),
            "-i".into(),
            request.input_file.clone().into_os_string(),
            "-frames:v".into(),
            "1".into(),
        ];
        if request.width.is_some() || request.height.is_some() {
            let dimension = |d: Option<u32>, source: &str| d.map_or_else(|| source.to_string(), |d| d.to_string());
            args.push("-vf".into());
            args.push(
                format!(
                    "scale={}:{}",
                    dimension(request.width, "iw"),
                    dimension(request.height, "ih")
                )
                .into(),
            );
        }
        args.push(output_file.as_os_str().to_os_string());
        args
    }

    /// Captures one frame. `Ok(false)` means `secs` is past the end.
    async fn capture(&self, request: &ExtractFramesRequest, secs: f64, output_file: &Path) -> Result<bool, StagingError> {
        let child = Command::new(&self.ffmpeg_path)
            .args(Self::frame_args(request, secs, output_file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StagingError::extraction(format!("Failed to start ffmpeg: {}", e)))?;

        let output = tokio::time::timeout(self.frame_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                StagingError::extraction(format!(
                    "ffmpeg timed out after {:?} at {}s of {}",
                    self.frame_timeout,
                    secs,
                    request.input_file.display()
                ))
            })?
            .map_err(|e| StagingError::extraction(format!("ffmpeg execution failed: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains(PAST_END_MESSAGE) {
            return Ok(false);
        }
        if !output.status.success() {
            return Err(StagingError::extraction(format!(
                "ffmpeg returned error at {}s: {}",
                secs,
                stderr.trim()
            )));
        }
        Ok(tokio::fs::try_exists(output_file).await.unwrap_or(false))
    }
}

/// Deletes the given files, ignoring ones already gone.
fn delete_files(paths: Vec<PathBuf>) -> CleanupObligation {
    CleanupObligation::new(format!("delete {} frames", paths.len()), move || async move {
        for path in &paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CleanupError::new(
                        format!("delete frame {}", path.display()),
                        e,
                    ))
                }
            }
        }
        Ok(())
    })
}

#[async_trait]
impl VideoFramesExtractor for FfmpegFramesExtractor {
    async fn extract(&self, request: &ExtractFramesRequest) -> Result<ExtractedFrames, StagingError> {
        if !(request.interval_secs > 0.0) {
            return Err(StagingError::extraction(format!(
                "interval must be positive, got {}",
                request.interval_secs
            )));
        }

        let start = request.start_secs.unwrap_or(0.0);
        let limit = request.limit.unwrap_or(usize::MAX);
        let mut relative_paths = Vec::new();
        let mut written = Vec::new();

        for step in 0u64.. {
            if relative_paths.len() >= limit {
                break;
            }
            let secs = start + step as f64 * request.interval_secs;
            if request.end_secs.is_some_and(|end| secs >= end) {
                break;
            }

            let name = frame_file_name(secs, &request.format);
            let output_file = request.output_dir.join(&name);
            match self.capture(request, secs, &output_file).await {
                Ok(true) => {
                    written.push(output_file);
                    relative_paths.push(name);
                }
                Ok(false) => break,
                Err(e) => {
                    if let Err(cleanup_error) = delete_files(written).run().await {
                        tracing::warn!(error = %cleanup_error, "Failed to delete partial frames");
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            video = %request.input_file.display(),
            frames = relative_paths.len(),
            "ffmpeg extraction finished"
        );

        Ok(ExtractedFrames {
            relative_paths,
            cleanup: delete_files(written),
        })
    }
}
