//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the conversation engine and the outside world. Adapters implement these ports.
//!
//! - `ChatApi` - Vision-chat backend contract
//! - `VideoFramesExtractor` - Turns a video into timestamped frame images
//! - `FileBatchUploader` - Pushes local files to remote storage

mod chat_api;
mod file_batch_uploader;
mod frames_extractor;

pub use chat_api::{Appendable, BuildPromptOutput, ChatApi};
pub use file_batch_uploader::{FileBatchUploader, UploadedFiles};
pub use frames_extractor::{ExtractFramesRequest, ExtractedFrames, VideoFramesExtractor};
