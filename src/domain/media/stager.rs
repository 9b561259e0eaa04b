//! Media staging: frames from videos, uploads of local images.
//!
//! Backends compose these helpers inside `build_video_prompt` and
//! `build_images_prompt`. Every helper returns the cleanup obligations for
//! the side effects it performed; on failure it discharges the ones it
//! already registered before returning the error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::conversation::{CleanupChain, CleanupObligation};
use crate::domain::foundation::{ChatError, ConversationId, StagingError};
use crate::ports::{
    BuildPromptOutput, ChatApi, ExtractFramesRequest, ExtractedFrames, FileBatchUploader,
    UploadedFiles, VideoFramesExtractor,
};

use super::{find_common_parent_path, ImageInput};

/// Maps `(video_file, tmp_dir, conversation_id)` to the frames directory.
pub type FramesDirectoryResolver =
    Arc<dyn Fn(&Path, &Path, &ConversationId) -> PathBuf + Send + Sync>;

/// How frames are extracted from a video.
#[derive(Clone)]
pub struct FrameExtractionOptions {
    pub extractor: Arc<dyn VideoFramesExtractor>,
    /// Defaults to `{tmp_dir}/{conversation_id}`.
    pub frames_directory_resolver: Option<FramesDirectoryResolver>,
    pub format: String,
    pub interval_secs: f64,
    /// Maximum number of frames per video.
    pub limit: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub start_secs: Option<f64>,
    pub end_secs: Option<f64>,
    pub delete_files_when_conversation_ends: bool,
}

impl FrameExtractionOptions {
    pub const DEFAULT_FORMAT: &'static str = "jpg";
    pub const DEFAULT_INTERVAL_SECS: f64 = 5.0;
    pub const DEFAULT_LIMIT: usize = 10;
    pub const DEFAULT_WIDTH: u32 = 200;

    pub fn new(extractor: Arc<dyn VideoFramesExtractor>) -> Self {
        Self {
            extractor,
            frames_directory_resolver: None,
            format: Self::DEFAULT_FORMAT.to_string(),
            interval_secs: Self::DEFAULT_INTERVAL_SECS,
            limit: Self::DEFAULT_LIMIT,
            width: Some(Self::DEFAULT_WIDTH),
            height: None,
            start_secs: None,
            end_secs: None,
            delete_files_when_conversation_ends: true,
        }
    }

    pub fn with_interval_secs(mut self, interval_secs: f64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the frame size; `None` keeps the source dimension.
    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_range(mut self, start_secs: Option<f64>, end_secs: Option<f64>) -> Self {
        self.start_secs = start_secs;
        self.end_secs = end_secs;
        self
    }

    pub fn with_frames_directory_resolver(mut self, resolver: FramesDirectoryResolver) -> Self {
        self.frames_directory_resolver = Some(resolver);
        self
    }

    pub fn keep_files(mut self) -> Self {
        self.delete_files_when_conversation_ends = false;
        self
    }

    /// Directory the frames of `video_file` are written to.
    pub fn frames_dir(&self, video_file: &Path, tmp_dir: &Path, id: &ConversationId) -> PathBuf {
        match &self.frames_directory_resolver {
            Some(resolve) => resolve(video_file, tmp_dir, id),
            None => tmp_dir.join(id.as_str()),
        }
    }

    fn request(&self, video_file: &Path, output_dir: &Path) -> ExtractFramesRequest {
        ExtractFramesRequest {
            input_file: video_file.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            interval_secs: self.interval_secs,
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            start_secs: self.start_secs,
            end_secs: self.end_secs,
            limit: Some(self.limit),
        }
    }
}

impl fmt::Debug for FrameExtractionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameExtractionOptions")
            .field("format", &self.format)
            .field("interval_secs", &self.interval_secs)
            .field("limit", &self.limit)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("start_secs", &self.start_secs)
            .field("end_secs", &self.end_secs)
            .field(
                "delete_files_when_conversation_ends",
                &self.delete_files_when_conversation_ends,
            )
            .finish_non_exhaustive()
    }
}

/// Where staged files are uploaded.
#[derive(Clone)]
pub struct StorageOptions {
    pub uploader: Arc<dyn FileBatchUploader>,
    pub container_name: String,
    /// Prepended to `{conversation_id}/` in every object path.
    pub path_prefix: String,
    pub delete_files_when_conversation_ends: bool,
}

impl StorageOptions {
    pub fn new(uploader: Arc<dyn FileBatchUploader>, container_name: impl Into<String>) -> Self {
        Self {
            uploader,
            container_name: container_name.into(),
            path_prefix: String::new(),
            delete_files_when_conversation_ends: true,
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn keep_files(mut self) -> Self {
        self.delete_files_when_conversation_ends = false;
        self
    }

    /// Object path prefix for one conversation.
    pub fn conversation_prefix(&self, id: &ConversationId) -> String {
        format!("{}{}/", self.path_prefix, id)
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("container_name", &self.container_name)
            .field("path_prefix", &self.path_prefix)
            .field(
                "delete_files_when_conversation_ends",
                &self.delete_files_when_conversation_ends,
            )
            .finish_non_exhaustive()
    }
}

/// Staged images: one fetchable URL per input image.
#[derive(Debug)]
pub struct StagedImages {
    pub download_urls: Vec<String>,
    pub cleanup: Option<CleanupObligation>,
}

/// Uploads local images so a remote model can fetch them.
///
/// URLs come back in input order. The cleanup is only returned when the
/// storage options ask for deletion at conversation end.
pub async fn upload_images(
    storage: &StorageOptions,
    images: &[ImageInput],
    id: &ConversationId,
) -> Result<StagedImages, StagingError> {
    let files: Vec<PathBuf> = images.iter().map(|i| i.image_file.clone()).collect();
    let common = find_common_parent_path(&files)
        .map_err(|e| StagingError::read(".", e))?;

    let UploadedFiles {
        download_urls,
        cleanup,
    } = storage
        .uploader
        .upload(
            &common.parent,
            &common.relative_paths,
            &storage.container_name,
            &storage.conversation_prefix(id),
        )
        .await?;

    tracing::debug!(
        conversation_id = %id,
        count = download_urls.len(),
        container = %storage.container_name,
        "Uploaded images"
    );

    Ok(StagedImages {
        download_urls,
        cleanup: storage.delete_files_when_conversation_ends.then_some(cleanup),
    })
}

/// Builds an images prompt from frames extracted out of a video.
///
/// The returned cleanup first releases whatever the images prompt staged
/// (uploads), then deletes the extracted frames if configured.
pub async fn images_prompt_from_video<A: ChatApi>(
    api: &A,
    frames: &FrameExtractionOptions,
    tmp_dir: &Path,
    video_file: &Path,
    id: &ConversationId,
) -> Result<BuildPromptOutput<A::Message, A::Params>, ChatError> {
    let frames_dir = frames.frames_dir(video_file, tmp_dir, id);
    tokio::fs::create_dir_all(&frames_dir)
        .await
        .map_err(|e| StagingError::extraction(format!("{}: {}", frames_dir.display(), e)))?;

    let ExtractedFrames {
        mut relative_paths,
        cleanup: frames_cleanup,
    } = frames
        .extractor
        .extract(&frames.request(video_file, &frames_dir))
        .await?;

    if relative_paths.len() > frames.limit {
        tracing::warn!(
            extracted = relative_paths.len(),
            limit = frames.limit,
            "Extractor exceeded the frame limit, truncating"
        );
        relative_paths.truncate(frames.limit);
    }
    tracing::debug!(
        conversation_id = %id,
        video = %video_file.display(),
        frames = relative_paths.len(),
        "Extracted video frames"
    );

    let images: Vec<ImageInput> = relative_paths
        .iter()
        .map(|p| ImageInput::new(frames_dir.join(p)))
        .collect();

    let frames_cleanup = frames
        .delete_files_when_conversation_ends
        .then_some(frames_cleanup);

    match api.build_images_prompt(&images, Some(id)).await {
        Ok(output) => {
            let mut chain = CleanupChain::new();
            chain.push_opt(output.cleanup);
            chain.push_opt(frames_cleanup);
            Ok(BuildPromptOutput {
                prompt: output.prompt,
                options: output.options,
                cleanup: chain.into_obligation(format!("video {}", video_file.display())),
            })
        }
        Err(e) => {
            if let Some(cleanup) = frames_cleanup {
                if let Err(cleanup_error) = cleanup.run().await {
                    tracing::warn!(error = %cleanup_error, "Failed to delete frames after staging error");
                }
            }
            Err(e)
        }
    }
}
