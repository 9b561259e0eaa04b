//! ChatAboutVideo - Starts conversations about media with one backend.
//!
//! The orchestrator shares a single backend adapter across every
//! conversation it starts. Starting a conversation stages each media entry
//! in order, collects the options and cleanups staging contributed, and
//! hands all of it to a new [`Conversation`].

use std::sync::Arc;

use crate::domain::conversation::{
    resolve_effective_options, CleanupChain, CompletionOptions, Conversation,
};
use crate::domain::foundation::{ChatError, ConversationId};
use crate::domain::media::{MediaEntry, MediaInput};
use crate::ports::{Appendable, ChatApi};

/// Orchestrator over one backend.
#[derive(Debug)]
pub struct ChatAboutVideo<A: ChatApi> {
    api: Arc<A>,
}

impl<A: ChatApi> Clone for ChatAboutVideo<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: ChatApi> ChatAboutVideo<A> {
    pub fn new(api: A) -> Self {
        Self { api: Arc::new(api) }
    }

    /// Wraps an adapter that is already shared.
    pub fn from_shared(api: Arc<A>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Raw vendor client of the backend.
    pub fn get_client(&self) -> &A::Client {
        self.api.client()
    }

    /// Starts a conversation about `media`.
    ///
    /// The prompt is laid out as: system turn (backends that use one), then
    /// for every entry its preface text and its staged media turns, then the
    /// start prompt text. If staging any entry fails, the cleanups of the
    /// entries staged so far run before the error is returned.
    pub async fn start_conversation(
        &self,
        media: impl Into<MediaInput>,
        options: Option<&CompletionOptions<A::Params>>,
    ) -> Result<Conversation<A>, ChatError> {
        let id = ConversationId::new();
        let mut options = resolve_effective_options(self.api.default_options(), options, None);
        let mut prompt = self.api.initial_prompt(&options);
        let mut cleanup = CleanupChain::new();

        for entry in media.into().into_entries() {
            if let Some(text) = entry.prompt_text() {
                let turns = self.api.build_text_prompt(text, Some(&id));
                prompt = self.api.append_to_prompt(Appendable::Turns(turns), Some(prompt));
            }

            let built = match &entry {
                MediaEntry::Video { video_file, .. } => {
                    self.api.build_video_prompt(video_file, Some(&id)).await
                }
                MediaEntry::Images { images, .. } => {
                    self.api.build_images_prompt(images, Some(&id)).await
                }
            };

            let output = match built {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %id,
                        error = %e,
                        staged = cleanup.len(),
                        "Media staging failed, releasing staged media"
                    );
                    cleanup.run_all().await;
                    return Err(e);
                }
            };

            prompt = self
                .api
                .append_to_prompt(Appendable::Turns(output.prompt), Some(prompt));
            if let Some(params) = output.options {
                options = options.with_merged_params(&params);
            }
            cleanup.push_opt(output.cleanup);
        }

        if let Some(text) = options.start_prompt_text.clone() {
            let turns = self.api.build_text_prompt(&text, Some(&id));
            prompt = self.api.append_to_prompt(Appendable::Turns(turns), Some(prompt));
        }

        tracing::info!(
            conversation_id = %id,
            turns = prompt.len(),
            cleanups = cleanup.len(),
            "Conversation started"
        );

        Ok(Conversation::new(id, Arc::clone(&self.api), prompt, options, cleanup))
    }
}
