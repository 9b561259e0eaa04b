//! Conversation entity - Accumulated prompt, options and pending cleanups.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::conversation::{
    BackoffOptions, CleanupChain, CleanupReport, CompletionOptions, ConversationState,
};
use crate::domain::foundation::{ChatError, ConversationId, ErrorClass, StateMachine};
use crate::domain::retry::RetryExecutor;
use crate::ports::{Appendable, ChatApi};

/// A multi-turn conversation with one backend.
///
/// The conversation exclusively owns its prompt, its effective options and
/// the cleanup obligations of everything staged while it was started.
/// `say()` takes `&mut self`, so turns are strictly sequential.
///
/// Dropping a conversation without calling [`Conversation::end`] leaks the
/// staged media.
pub struct Conversation<A: ChatApi> {
    id: ConversationId,
    api: Arc<A>,
    prompt: Vec<A::Message>,
    options: CompletionOptions<A::Params>,
    cleanup: CleanupChain,
    state: ConversationState,
    started_at: DateTime<Utc>,
}

impl<A: ChatApi> Conversation<A> {
    /// Creates a conversation in the `Started` state.
    pub fn new(
        id: ConversationId,
        api: Arc<A>,
        prompt: Vec<A::Message>,
        options: CompletionOptions<A::Params>,
        cleanup: CleanupChain,
    ) -> Self {
        Self {
            id,
            api,
            prompt,
            options,
            cleanup,
            state: ConversationState::Started,
            started_at: Utc::now(),
        }
    }

    // === Accessors ===

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Snapshot of the accumulated prompt.
    pub fn prompt(&self) -> &[A::Message] {
        &self.prompt
    }

    pub fn options(&self) -> &CompletionOptions<A::Params> {
        &self.options
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of cleanup obligations `end()` will run.
    pub fn pending_cleanups(&self) -> usize {
        self.cleanup.len()
    }

    // === Turns ===

    /// Sends `message` and returns the model's text answer.
    ///
    /// The prompt grows by the user turn and the assistant turn only when
    /// the call succeeds; on error it is left untouched so the caller can
    /// simply try again. `Ok(None)` means the model produced no text.
    pub async fn say(
        &mut self,
        message: &str,
        overrides: Option<&CompletionOptions<A::Params>>,
    ) -> Result<Option<String>, ChatError> {
        if !self.state.accepts_turns() {
            return Err(ChatError::ConversationEnded(self.id.clone()));
        }

        let user_turns = self.api.build_text_prompt(message, Some(&self.id));
        let updated = self
            .api
            .append_to_prompt(Appendable::Turns(user_turns), Some(self.prompt.clone()));

        let options = match overrides {
            Some(overrides) => self.options.merged_with(overrides),
            None => self.options.clone(),
        };

        tracing::debug!(
            conversation_id = %self.id,
            turns = updated.len(),
            "Sending turn"
        );

        let executor = retry_executor(&self.api, &options.backoff);
        let api = &self.api;
        let prompt = updated.as_slice();
        let effective = &options;
        let response = executor
            .run(|| api.generate_content(prompt, effective))
            .await
            .map_err(|e| {
                tracing::warn!(
                    conversation_id = %self.id,
                    class = ?self.api.classify(&e),
                    error = %e,
                    "Turn failed"
                );
                e
            })?;

        let text = self.api.response_text(&response);
        let next_state = self
            .state
            .transition_to(ConversationState::Active)
            .map_err(|e| ChatError::configuration(e.to_string()))?;

        self.prompt = self
            .api
            .append_to_prompt(Appendable::Response(&response), Some(updated));
        self.state = next_state;

        tracing::debug!(
            conversation_id = %self.id,
            turns = self.prompt.len(),
            has_text = text.is_some(),
            "Turn completed"
        );
        Ok(text)
    }

    /// Ends the conversation, running every pending cleanup exactly once.
    ///
    /// Cleanup failures are logged and reported, never propagated. Calling
    /// `end()` again does nothing.
    pub async fn end(&mut self) -> CleanupReport {
        match self.state.transition_to(ConversationState::Ended) {
            Ok(state) => self.state = state,
            Err(_) => {
                tracing::warn!(conversation_id = %self.id, "Conversation already ended");
                return CleanupReport::default();
            }
        }

        let report = self.cleanup.run_all().await;
        tracing::info!(
            conversation_id = %self.id,
            completed = report.completed.len(),
            failed = report.failures.len(),
            "Conversation ended"
        );
        report
    }
}

impl<A: ChatApi> Drop for Conversation<A> {
    fn drop(&mut self) {
        if !self.cleanup.is_empty() {
            tracing::warn!(
                conversation_id = %self.id,
                pending = self.cleanup.len(),
                "Conversation dropped without end(), staged media is left behind"
            );
        }
    }
}

impl<A: ChatApi> std::fmt::Debug for Conversation<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("turns", &self.prompt.len())
            .field("pending_cleanups", &self.cleanup.len())
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Nested retry scopes around one backend call.
///
/// Outermost to innermost: download, connectivity, server, throttling.
/// Each scope uses the backend's own predicate and its class's schedule.
pub(crate) fn retry_executor<A: ChatApi>(
    api: &Arc<A>,
    backoff: &BackoffOptions,
) -> RetryExecutor<ChatError> {
    let download = Arc::clone(api);
    let connectivity = Arc::clone(api);
    let server = Arc::clone(api);
    let throttling = Arc::clone(api);
    RetryExecutor::new()
        .with_scope(
            ErrorClass::Download.to_string(),
            backoff.schedule(ErrorClass::Download).to_vec(),
            move |e: &ChatError| download.is_download_error(e),
        )
        .with_scope(
            ErrorClass::Connectivity.to_string(),
            backoff.schedule(ErrorClass::Connectivity).to_vec(),
            move |e: &ChatError| connectivity.is_connectivity_error(e),
        )
        .with_scope(
            ErrorClass::Server.to_string(),
            backoff.schedule(ErrorClass::Server).to_vec(),
            move |e: &ChatError| server.is_server_error(e),
        )
        .with_scope(
            ErrorClass::Throttling.to_string(),
            backoff.schedule(ErrorClass::Throttling).to_vec(),
            move |e: &ChatError| throttling.is_throttling_error(e),
        )
}
