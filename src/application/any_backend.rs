//! Backend selection from an explicit tagged configuration.
//!
//! Callers that pick the backend at runtime (for example from environment
//! configuration) use [`AnyChatAboutVideo`]; callers that know their backend
//! statically use [`ChatAboutVideo`] directly and keep full typing.

use serde_json::Value;

use super::ChatAboutVideo;
use crate::adapters::ai::{ChatGptApi, ChatGptOptions, GeminiApi, GeminiOptions};
use crate::domain::conversation::{CleanupReport, Conversation, ConversationState};
use crate::domain::foundation::{ChatError, ConversationId};
use crate::domain::media::MediaInput;

/// Which backend to construct, with only the fields it needs.
#[derive(Debug, Clone)]
pub enum BackendOptions {
    ChatGpt(ChatGptOptions),
    Gemini(GeminiOptions),
}

impl BackendOptions {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatGpt(_) => "chatgpt",
            Self::Gemini(_) => "gemini",
        }
    }
}

/// An orchestrator over a backend chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyChatAboutVideo {
    ChatGpt(ChatAboutVideo<ChatGptApi>),
    Gemini(ChatAboutVideo<GeminiApi>),
}

impl AnyChatAboutVideo {
    /// Builds the adapter selected by `options`.
    pub fn from_options(options: BackendOptions) -> Result<Self, ChatError> {
        tracing::debug!(backend = options.kind(), "Creating chat backend");
        Ok(match options {
            BackendOptions::ChatGpt(options) => Self::ChatGpt(ChatAboutVideo::new(ChatGptApi::new(options)?)),
            BackendOptions::Gemini(options) => Self::Gemini(ChatAboutVideo::new(GeminiApi::new(options)?)),
        })
    }

    /// Starts a conversation with the backend's default options.
    pub async fn start_conversation(&self, media: impl Into<MediaInput>) -> Result<AnyConversation, ChatError> {
        Ok(match self {
            Self::ChatGpt(chat) => AnyConversation::ChatGpt(chat.start_conversation(media, None).await?),
            Self::Gemini(chat) => AnyConversation::Gemini(chat.start_conversation(media, None).await?),
        })
    }
}

/// A conversation with a backend chosen at runtime.
#[derive(Debug)]
pub enum AnyConversation {
    ChatGpt(Conversation<ChatGptApi>),
    Gemini(Conversation<GeminiApi>),
}

impl AnyConversation {
    pub fn id(&self) -> &ConversationId {
        match self {
            Self::ChatGpt(c) => c.id(),
            Self::Gemini(c) => c.id(),
        }
    }

    pub fn state(&self) -> ConversationState {
        match self {
            Self::ChatGpt(c) => c.state(),
            Self::Gemini(c) => c.state(),
        }
    }

    pub fn turn_count(&self) -> usize {
        match self {
            Self::ChatGpt(c) => c.prompt().len(),
            Self::Gemini(c) => c.prompt().len(),
        }
    }

    /// The accumulated prompt in the backend's wire representation.
    pub fn prompt_json(&self) -> Result<Value, ChatError> {
        let encoded = match self {
            Self::ChatGpt(c) => serde_json::to_value(c.prompt()),
            Self::Gemini(c) => serde_json::to_value(c.prompt()),
        };
        encoded.map_err(|e| ChatError::parse(format!("Failed to encode prompt: {}", e)))
    }

    pub async fn say(&mut self, message: &str) -> Result<Option<String>, ChatError> {
        match self {
            Self::ChatGpt(c) => c.say(message, None).await,
            Self::Gemini(c) => c.say(message, None).await,
        }
    }

    pub async fn end(&mut self) -> CleanupReport {
        match self {
            Self::ChatGpt(c) => c.end().await,
            Self::Gemini(c) => c.end().await,
        }
    }
}
