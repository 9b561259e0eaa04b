//! Lifecycle state machines.

use super::ValidationError;

/// Trait for lifecycle enums with a fixed transition table.
///
/// Implementors list their legal moves; `transition_to` rejects anything
/// else so callers never mutate a lifecycle field directly.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if moving from self to target is legal.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all legal target states from the current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs the transition, rejecting illegal moves.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Returns true when no further transitions are possible.
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
