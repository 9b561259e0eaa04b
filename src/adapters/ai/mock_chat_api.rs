//! Mock Chat API for testing.
//!
//! Provides a scripted implementation of the ChatApi port so the engine
//! can be exercised without calling a real model.
//!
//! # Features
//!
//! - Pre-configured replies, consumed in order
//! - Error injection for retry testing
//! - Call tracking for verification
//! - Optional real staging through configured frames and storage options
//!
//! # Example
//!
//! ```ignore
//! let api = MockChatApi::new()
//!     .with_reply("A ball rolls.")
//!     .with_error(ChatError::api(429, "slow down"));
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::sleep;

use crate::domain::conversation::CompletionOptions;
use crate::domain::foundation::{ChatError, ConversationId};
use crate::domain::media::{
    images_prompt_from_video, upload_images, FrameExtractionOptions, ImageInput, StorageOptions,
};
use crate::ports::{Appendable, BuildPromptOutput, ChatApi};

/// Untyped parameters, merged key by key.
pub type MockParams = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MockRole {
    System,
    User,
    Assistant,
}

/// One prompt turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockMessage {
    pub role: MockRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl MockMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MockRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MockRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MockRole::Assistant, content)
    }

    /// A user turn referencing staged media, with an optional caption.
    pub fn media(url: impl Into<String>, caption: Option<&str>) -> Self {
        Self {
            role: MockRole::User,
            content: caption.unwrap_or_default().to_string(),
            media_url: Some(url.into()),
        }
    }

    fn new(role: MockRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            media_url: None,
        }
    }
}

/// Raw mock response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub text: Option<String>,
}

/// A recorded `generate_content` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: Vec<MockMessage>,
    pub options: CompletionOptions<MockParams>,
}

/// Scripted ChatApi.
#[derive(Debug, Clone)]
pub struct MockChatApi {
    replies: Arc<Mutex<VecDeque<Result<MockResponse, ChatError>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    defaults: CompletionOptions<MockParams>,
    delay: Duration,
    storage: Option<StorageOptions>,
    frames: Option<FrameExtractionOptions>,
    video_params: Option<MockParams>,
    tmp_dir: PathBuf,
}

impl Default for MockChatApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatApi {
    /// Creates a mock with engine defaults and no staging.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            defaults: CompletionOptions::engine_defaults(),
            delay: Duration::ZERO,
            storage: None,
            frames: None,
            video_params: None,
            tmp_dir: std::env::temp_dir(),
        }
    }

    /// Queues a text reply.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(MockResponse {
            text: Some(text.into()),
        }));
        self
    }

    /// Queues a reply without text.
    pub fn with_empty_reply(self) -> Self {
        self.push(Ok(MockResponse { text: None }));
        self
    }

    /// Queues a failure.
    pub fn with_error(self, error: ChatError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Merges `options` over the engine defaults.
    pub fn with_default_options(mut self, options: CompletionOptions<MockParams>) -> Self {
        self.defaults = self.defaults.merged_with(&options);
        self
    }

    /// Stages images through `storage`.
    pub fn with_storage(mut self, storage: StorageOptions) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Stages videos as extracted frames.
    pub fn with_frames(mut self, frames: FrameExtractionOptions) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Parameters every video prompt contributes.
    pub fn with_video_params(mut self, params: MockParams) -> Self {
        self.video_params = Some(params);
        self
    }

    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = tmp_dir.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, reply: Result<MockResponse, ChatError>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    fn next_reply(&self) -> Result<MockResponse, ChatError> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Ok(MockResponse {
                    text: Some("Mock response".to_string()),
                })
            })
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    type Client = ();
    type Message = MockMessage;
    type Response = MockResponse;
    type Params = MockParams;

    fn client(&self) -> &() {
        &()
    }

    fn default_options(&self) -> &CompletionOptions<MockParams> {
        &self.defaults
    }

    fn build_text_prompt(&self, text: &str, _conversation_id: Option<&ConversationId>) -> Vec<MockMessage> {
        vec![MockMessage::user(text)]
    }

    async fn build_video_prompt(
        &self,
        video_file: &Path,
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<MockMessage, MockParams>, ChatError> {
        let id = conversation_id
            .cloned()
            .unwrap_or_else(ConversationId::temporary);
        let output = match &self.frames {
            Some(frames) => images_prompt_from_video(self, frames, &self.tmp_dir, video_file, &id).await?,
            None => BuildPromptOutput::new(vec![MockMessage::media(
                video_file.display().to_string(),
                None,
            )]),
        };
        Ok(match &self.video_params {
            Some(params) => output.with_options(params.clone()),
            None => output,
        })
    }

    async fn build_images_prompt(
        &self,
        images: &[ImageInput],
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<MockMessage, MockParams>, ChatError> {
        let id = conversation_id
            .cloned()
            .unwrap_or_else(ConversationId::temporary);
        let (urls, cleanup) = match &self.storage {
            Some(storage) => {
                let staged = upload_images(storage, images, &id).await?;
                (staged.download_urls, staged.cleanup)
            }
            None => (
                images
                    .iter()
                    .map(|i| i.image_file.display().to_string())
                    .collect(),
                None,
            ),
        };

        let prompt = urls
            .into_iter()
            .zip(images)
            .map(|(url, image)| MockMessage::media(url, image.prompt_text.as_deref()))
            .collect();
        Ok(BuildPromptOutput::new(prompt).with_cleanup(cleanup))
    }

    fn initial_prompt(&self, options: &CompletionOptions<MockParams>) -> Vec<MockMessage> {
        options
            .system_prompt_text
            .iter()
            .map(|text| MockMessage::system(text.clone()))
            .collect()
    }

    fn append_to_prompt(
        &self,
        addition: Appendable<'_, MockMessage, MockResponse>,
        existing: Option<Vec<MockMessage>>,
    ) -> Vec<MockMessage> {
        let mut prompt = existing.unwrap_or_else(|| self.initial_prompt(&self.defaults));
        match addition {
            Appendable::Turns(turns) => prompt.extend(turns),
            Appendable::Response(response) => {
                prompt.push(MockMessage::assistant(response.text.clone().unwrap_or_default()))
            }
        }
        prompt
    }

    async fn generate_content(
        &self,
        prompt: &[MockMessage],
        options: &CompletionOptions<MockParams>,
    ) -> Result<MockResponse, ChatError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                prompt: prompt.to_vec(),
                options: options.clone(),
            });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        self.next_reply()
    }

    fn response_text(&self, response: &MockResponse) -> Option<String> {
        response.text.clone()
    }

    fn is_throttling_error(&self, error: &ChatError) -> bool {
        error.status() == Some(429)
    }

    fn is_server_error(&self, error: &ChatError) -> bool {
        matches!(error.status(), Some(500..=599))
    }

    fn is_connectivity_error(&self, error: &ChatError) -> bool {
        error.as_transport_error().is_some()
    }

    fn is_download_error(&self, error: &ChatError) -> bool {
        error.status() == Some(400)
            && error
                .message()
                .is_some_and(|m| m.to_lowercase().contains("download"))
    }
}
