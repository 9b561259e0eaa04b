//! Conversation domain module.
//!
//! The conversation entity, its lifecycle, the options it resolves for each
//! turn and the cleanup obligations it owns.

mod cleanup;
mod conversation;
mod options;
mod state;

pub use cleanup::{CleanupChain, CleanupFuture, CleanupObligation, CleanupReport};
pub use conversation::Conversation;
pub use options::{
    defaults, resolve_effective_options, BackoffOptions, CompletionOptions, GenerationParams,
};
pub use state::ConversationState;
