//! Video adapters.
//!
//! - `FfmpegFramesExtractor` - VideoFramesExtractor backed by the ffmpeg CLI

mod ffmpeg_frames_extractor;

pub use ffmpeg_frames_extractor::{frame_file_name, FfmpegFramesExtractor};
