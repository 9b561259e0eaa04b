//! Completion options and their three-level resolution.
//!
//! Options are layered engine defaults, then conversation options, then
//! per-call overrides. Resolution always produces a fresh value; no layer is
//! ever mutated.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ErrorClass;

/// Built-in engine defaults.
pub mod defaults {
    /// Backoff between retries of throttled calls, in milliseconds.
    pub const BACKOFF_ON_THROTTLING_MS: &[u64] =
        &[1000, 2000, 3000, 5000, 8000, 13000, 21000, 34000, 55000];

    /// Backoff between retries of calls that failed with a server error.
    pub const BACKOFF_ON_SERVER_ERROR_MS: &[u64] = &[2000, 5000, 10000, 20000];

    /// Backoff between retries of calls that failed to connect or timed out.
    pub const BACKOFF_ON_CONNECTIVITY_ERROR_MS: &[u64] = &[1000, 2000, 5000];

    /// Download errors are not retried.
    pub const BACKOFF_ON_DOWNLOAD_ERROR_MS: &[u64] = &[];

    pub const SYSTEM_PROMPT_TEXT: &str = "You are a helpful assistant who can understand video. \
Based on frames extracted from the video, you are able to understand what is happening in the video. \
You will be given video frames by the user, then you will follow the instructions from the user. \
You answers should be objective, concise and accurate.";
}

/// Retry backoff schedules keyed by failure class.
///
/// `None` means "not set at this layer"; an empty schedule disables retries
/// for that class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_throttling: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_server_error: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_connectivity_error: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_download_error: Option<Vec<u64>>,
}

impl BackoffOptions {
    /// The built-in schedules for every class.
    pub fn engine_defaults() -> Self {
        Self {
            on_throttling: Some(defaults::BACKOFF_ON_THROTTLING_MS.to_vec()),
            on_server_error: Some(defaults::BACKOFF_ON_SERVER_ERROR_MS.to_vec()),
            on_connectivity_error: Some(defaults::BACKOFF_ON_CONNECTIVITY_ERROR_MS.to_vec()),
            on_download_error: Some(defaults::BACKOFF_ON_DOWNLOAD_ERROR_MS.to_vec()),
        }
    }

    /// Sets the schedule for one class.
    pub fn with_schedule(mut self, class: ErrorClass, schedule: Vec<u64>) -> Self {
        *self.slot_mut(class) = Some(schedule);
        self
    }

    /// Returns the schedule for a class, empty when unset.
    pub fn schedule(&self, class: ErrorClass) -> &[u64] {
        let slot = match class {
            ErrorClass::Throttling => &self.on_throttling,
            ErrorClass::Server => &self.on_server_error,
            ErrorClass::Connectivity => &self.on_connectivity_error,
            ErrorClass::Download => &self.on_download_error,
        };
        slot.as_deref().unwrap_or(&[])
    }

    /// Returns a new value where every schedule set in `overrides` wins.
    pub fn merged_with(&self, overrides: &Self) -> Self {
        Self {
            on_throttling: overrides
                .on_throttling
                .clone()
                .or_else(|| self.on_throttling.clone()),
            on_server_error: overrides
                .on_server_error
                .clone()
                .or_else(|| self.on_server_error.clone()),
            on_connectivity_error: overrides
                .on_connectivity_error
                .clone()
                .or_else(|| self.on_connectivity_error.clone()),
            on_download_error: overrides
                .on_download_error
                .clone()
                .or_else(|| self.on_download_error.clone()),
        }
    }

    fn slot_mut(&mut self, class: ErrorClass) -> &mut Option<Vec<u64>> {
        match class {
            ErrorClass::Throttling => &mut self.on_throttling,
            ErrorClass::Server => &mut self.on_server_error,
            ErrorClass::Connectivity => &mut self.on_connectivity_error,
            ErrorClass::Download => &mut self.on_download_error,
        }
    }
}

/// Backend-native generation parameters.
///
/// These are forwarded to the vendor API as-is, so engine-only settings
/// never live here.
pub trait GenerationParams: Clone + Debug + Default + Send + Sync + 'static {
    /// Returns a new value where fields set in `overrides` win.
    fn merge(&self, overrides: &Self) -> Self;
}

/// Untyped parameters, merged key by key.
impl GenerationParams for serde_json::Map<String, serde_json::Value> {
    fn merge(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Options for a completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions<P> {
    /// Instruction sent ahead of the conversation.
    pub system_prompt_text: Option<String>,
    /// Text sent once, right after the staged media.
    pub start_prompt_text: Option<String>,
    /// Retry schedules per failure class.
    pub backoff: BackoffOptions,
    /// Vendor parameters.
    pub params: P,
}

impl<P: GenerationParams> CompletionOptions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in system prompt and backoff schedules, default parameters.
    pub fn engine_defaults() -> Self {
        Self {
            system_prompt_text: Some(defaults::SYSTEM_PROMPT_TEXT.to_string()),
            start_prompt_text: None,
            backoff: BackoffOptions::engine_defaults(),
            params: P::default(),
        }
    }

    pub fn with_system_prompt_text(mut self, text: impl Into<String>) -> Self {
        self.system_prompt_text = Some(text.into());
        self
    }

    pub fn with_start_prompt_text(mut self, text: impl Into<String>) -> Self {
        self.start_prompt_text = Some(text.into());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffOptions) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_params(mut self, params: P) -> Self {
        self.params = params;
        self
    }

    /// Returns a new value where everything set in `overrides` wins.
    pub fn merged_with(&self, overrides: &Self) -> Self {
        Self {
            system_prompt_text: overrides
                .system_prompt_text
                .clone()
                .or_else(|| self.system_prompt_text.clone()),
            start_prompt_text: overrides
                .start_prompt_text
                .clone()
                .or_else(|| self.start_prompt_text.clone()),
            backoff: self.backoff.merged_with(&overrides.backoff),
            params: self.params.merge(&overrides.params),
        }
    }

    /// Returns a new value with `extra` merged into the vendor parameters.
    pub fn with_merged_params(&self, extra: &P) -> Self {
        Self {
            params: self.params.merge(extra),
            ..self.clone()
        }
    }
}

/// Resolves the options for one call from its three layers.
pub fn resolve_effective_options<P: GenerationParams>(
    engine: &CompletionOptions<P>,
    conversation: Option<&CompletionOptions<P>>,
    call: Option<&CompletionOptions<P>>,
) -> CompletionOptions<P> {
    let mut resolved = engine.clone();
    if let Some(conversation) = conversation {
        resolved = resolved.merged_with(conversation);
    }
    if let Some(call) = call {
        resolved = resolved.merged_with(call);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    type Params = Map<String, Value>;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn engine_defaults_match_builtin_schedules() {
        let backoff = BackoffOptions::engine_defaults();
        assert_eq!(backoff.schedule(ErrorClass::Throttling).len(), 9);
        assert_eq!(
            backoff.schedule(ErrorClass::Server),
            &[2000, 5000, 10000, 20000]
        );
        assert!(backoff.schedule(ErrorClass::Download).is_empty());
    }

    #[test]
    fn unset_schedule_is_empty() {
        assert!(BackoffOptions::default()
            .schedule(ErrorClass::Connectivity)
            .is_empty());
    }

    #[test]
    fn call_overrides_win_over_conversation_and_engine() {
        let engine = CompletionOptions::<Params>::new()
            .with_system_prompt_text("engine")
            .with_params(params(json!({"temperature": 0.0, "max_tokens": 100})));
        let conversation = CompletionOptions::<Params>::new()
            .with_params(params(json!({"temperature": 0.5})));
        let call = CompletionOptions::<Params>::new()
            .with_system_prompt_text("call")
            .with_backoff(BackoffOptions::default().with_schedule(ErrorClass::Throttling, vec![1]));

        let resolved = resolve_effective_options(&engine, Some(&conversation), Some(&call));

        assert_eq!(resolved.system_prompt_text.as_deref(), Some("call"));
        assert_eq!(resolved.params["temperature"], json!(0.5));
        assert_eq!(resolved.params["max_tokens"], json!(100));
        assert_eq!(resolved.backoff.schedule(ErrorClass::Throttling), &[1]);
    }

    #[test]
    fn resolution_does_not_mutate_layers() {
        let engine = CompletionOptions::<Params>::new().with_start_prompt_text("hello");
        let before = engine.clone();
        let call = CompletionOptions::<Params>::new().with_start_prompt_text("bye");

        let _ = resolve_effective_options(&engine, None, Some(&call));

        assert_eq!(engine, before);
    }

    #[test]
    fn with_merged_params_keeps_everything_else() {
        let options = CompletionOptions::<Params>::new()
            .with_system_prompt_text("sys")
            .with_params(params(json!({"a": 1})));
        let merged = options.with_merged_params(&params(json!({"b": 2})));
        assert_eq!(merged.system_prompt_text.as_deref(), Some("sys"));
        assert_eq!(merged.params.len(), 2);
    }

    fn schedule() -> impl Strategy<Value = Option<Vec<u64>>> {
        proptest::option::of(proptest::collection::vec(0u64..10_000, 0..5))
    }

    proptest! {
        #[test]
        fn later_layer_wins_when_set(
            engine in schedule(),
            conversation in schedule(),
            call in schedule(),
        ) {
            let layer = |s: Option<Vec<u64>>| CompletionOptions::<Params> {
                backoff: BackoffOptions { on_throttling: s, ..Default::default() },
                ..Default::default()
            };
            let resolved = resolve_effective_options(
                &layer(engine.clone()),
                Some(&layer(conversation.clone())),
                Some(&layer(call.clone())),
            );
            let expected = call.or(conversation).or(engine);
            prop_assert_eq!(resolved.backoff.on_throttling, expected);
        }
    }
}
