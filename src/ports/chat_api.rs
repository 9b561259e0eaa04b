//! Chat API Port - The uniform contract every vision-chat backend implements.
//!
//! The conversation engine and the orchestrator only ever talk to a backend
//! through this trait, so they stay independent of vendor request and
//! response shapes.
//!
//! # Design
//!
//! - Prompts are ordered lists of backend-native turns (`Self::Message`)
//! - Media prompts may contribute extra generation parameters and a cleanup
//!   obligation that reverses their staging side effects
//! - Error classification is a set of pure predicates over [`ChatError`]

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::conversation::{CleanupObligation, CompletionOptions, GenerationParams};
use crate::domain::foundation::{ChatError, ConversationId, ErrorClass};
use crate::domain::media::ImageInput;

/// Port for vision-chat backends.
///
/// Implementations hold no per-conversation mutable state; one instance is
/// shared by every conversation an orchestrator starts.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Raw vendor client handle.
    type Client: Send + Sync;
    /// One prompt turn in the vendor's representation.
    type Message: Clone + Debug + Send + Sync + Serialize;
    /// Raw vendor response.
    type Response: Debug + Send + Sync;
    /// Vendor generation parameters.
    type Params: GenerationParams;

    /// Returns the underlying client for advanced use.
    fn client(&self) -> &Self::Client;

    /// Options this backend was constructed with, engine defaults included.
    fn default_options(&self) -> &CompletionOptions<Self::Params>;

    /// Builds a single user turn holding `text`. Pure, no I/O.
    fn build_text_prompt(
        &self,
        text: &str,
        conversation_id: Option<&ConversationId>,
    ) -> Vec<Self::Message>;

    /// Stages a video and builds the user turns referencing it.
    ///
    /// Staging failures propagate; no partial prompt is returned.
    async fn build_video_prompt(
        &self,
        video_file: &Path,
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<Self::Message, Self::Params>, ChatError>;

    /// Stages local images and builds the user turns referencing them.
    ///
    /// A caption becomes a text part right before its image.
    async fn build_images_prompt(
        &self,
        images: &[ImageInput],
        conversation_id: Option<&ConversationId>,
    ) -> Result<BuildPromptOutput<Self::Message, Self::Params>, ChatError>;

    /// Opening turns of a prompt resolved with `options`.
    ///
    /// Backends that send the system prompt as a turn start from it; the
    /// others start empty.
    fn initial_prompt(&self, options: &CompletionOptions<Self::Params>) -> Vec<Self::Message>;

    /// Returns a new prompt with `addition` appended to `existing`.
    ///
    /// A response becomes exactly one assistant turn. Without an existing
    /// prompt, the backend starts from [`ChatApi::initial_prompt`] with its
    /// default options.
    fn append_to_prompt(
        &self,
        addition: Appendable<'_, Self::Message, Self::Response>,
        existing: Option<Vec<Self::Message>>,
    ) -> Vec<Self::Message>;

    /// Invokes the remote model.
    ///
    /// Only `options.params` and backend-relevant prompt text reach the
    /// vendor; retry schedules are never forwarded.
    async fn generate_content(
        &self,
        prompt: &[Self::Message],
        options: &CompletionOptions<Self::Params>,
    ) -> Result<Self::Response, ChatError>;

    /// Extracts the primary text answer, `None` if the model produced none.
    fn response_text(&self, response: &Self::Response) -> Option<String>;

    fn is_throttling_error(&self, error: &ChatError) -> bool;

    fn is_server_error(&self, error: &ChatError) -> bool;

    fn is_connectivity_error(&self, error: &ChatError) -> bool;

    fn is_download_error(&self, error: &ChatError) -> bool;

    /// First matching class, checked throttling, server, connectivity, download.
    fn classify(&self, error: &ChatError) -> Option<ErrorClass> {
        ErrorClass::ALL.into_iter().find(|class| match class {
            ErrorClass::Throttling => self.is_throttling_error(error),
            ErrorClass::Server => self.is_server_error(error),
            ErrorClass::Connectivity => self.is_connectivity_error(error),
            ErrorClass::Download => self.is_download_error(error),
        })
    }
}

/// What [`ChatApi::append_to_prompt`] appends.
#[derive(Debug)]
pub enum Appendable<'a, M, R> {
    /// Prompt turns, appended as-is.
    Turns(Vec<M>),
    /// A raw response, normalized into one assistant turn.
    Response(&'a R),
}

/// Result of building a media prompt.
#[derive(Debug)]
pub struct BuildPromptOutput<M, P> {
    /// User turns referencing the staged media.
    pub prompt: Vec<M>,
    /// Generation parameters the staged media requires.
    pub options: Option<P>,
    /// Reverses every staging side effect of this build.
    pub cleanup: Option<CleanupObligation>,
}

impl<M, P> BuildPromptOutput<M, P> {
    pub fn new(prompt: Vec<M>) -> Self {
        Self {
            prompt,
            options: None,
            cleanup: None,
        }
    }

    pub fn with_options(mut self, options: P) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_cleanup(mut self, cleanup: Option<CleanupObligation>) -> Self {
        self.cleanup = cleanup;
        self
    }
}
