//! Application layer - Conversation orchestration.
//!
//! Composes a backend adapter with media staging to start conversations.
//! `ChatAboutVideo` is generic over the backend; `AnyChatAboutVideo`
//! selects one at runtime from a tagged `BackendOptions`.

mod any_backend;
mod chat_about_video;

pub use any_backend::{AnyChatAboutVideo, AnyConversation, BackendOptions};
pub use chat_about_video::ChatAboutVideo;
