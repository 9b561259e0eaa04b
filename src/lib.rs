//! Chat About Video - multi-turn conversations with vision-capable LLMs
//! about videos and images.
//!
//! Videos are staged for the backend (frames extracted with ffmpeg, uploaded
//! to object storage or inlined, or ingested into a video retrieval index),
//! and every side effect of staging is undone when the conversation ends.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_about_video::adapters::{ChatGptApi, ChatGptOptions, FfmpegFramesExtractor, LocalDirectoryUploader};
//! use chat_about_video::application::ChatAboutVideo;
//! use chat_about_video::domain::media::{FrameExtractionOptions, MediaInput, StorageOptions};
//!
//! # async fn run() -> Result<(), chat_about_video::domain::foundation::ChatError> {
//! let storage = StorageOptions::new(Arc::new(LocalDirectoryUploader::new("/tmp/uploads")), "frames");
//! let frames = FrameExtractionOptions::new(Arc::new(FfmpegFramesExtractor::new()));
//! let api = ChatGptApi::new(
//!     ChatGptOptions::new("sk-...", "gpt-4o", storage).with_extract_video_frames(frames),
//! )?;
//!
//! let chat = ChatAboutVideo::new(api);
//! let mut conversation = chat.start_conversation(MediaInput::Video("clip.mp4".into()), None).await?;
//! let answer = conversation.say("What happens in the video?", None).await?;
//! println!("{}", answer.unwrap_or_default());
//! conversation.end().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Layers
//!
//! - `domain` - Conversation lifecycle, options resolution, retries, cleanup, media staging
//! - `ports` - Backend, frame extractor and uploader contracts
//! - `adapters` - ChatGPT, Gemini, mock backend, ffmpeg, uploaders
//! - `application` - Conversation orchestration
//! - `config` - Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
