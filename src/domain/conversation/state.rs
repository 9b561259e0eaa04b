//! Conversation lifecycle.
//!
//! A conversation starts with its staged media prompt, becomes active after
//! the first successful turn and ends once its cleanup obligations have been
//! discharged.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// The lifecycle state of a conversation.
///
/// - `Started`: constructed, prompt holds the initial and media turns
/// - `Active`: at least one `say()` succeeded
/// - `Ended`: `end()` ran, no further turns are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Started,
    Active,
    Ended,
}

impl ConversationState {
    /// Returns true if `say()` may be called in this state.
    pub fn accepts_turns(&self) -> bool {
        !matches!(self, Self::Ended)
    }
}

impl StateMachine for ConversationState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConversationState::*;
        matches!(
            (self, target),
            // First successful turn
            (Started, Active) |
            // Every further successful turn
            (Active, Active) |
            (Started, Ended) |
            (Active, Ended)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationState::*;
        match self {
            Started => vec![Active, Ended],
            Active => vec![Active, Ended],
            Ended => vec![],
        }
    }
}
