//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the conversation engine to external systems:
//! - `ai` - Chat backends (ChatGPT, Gemini, mock) and the video index client
//! - `storage` - File batch uploaders (local directory, object store)
//! - `video` - Frame extraction with ffmpeg

pub mod ai;
pub mod storage;
pub mod video;

pub use ai::{ChatGptApi, ChatGptOptions, GeminiApi, GeminiOptions, MockChatApi};
pub use storage::{LocalDirectoryUploader, ObjectStoreUploader};
pub use video::FfmpegFramesExtractor;
