//! Foundation module - Shared domain primitives.
//!
//! Identifiers, the error taxonomy and the lifecycle trait used by the
//! conversation engine.

mod errors;
mod ids;
mod state_machine;

pub use errors::{
    ApiError, ChatError, CleanupError, ErrorClass, StagingError, TransportError,
    TransportErrorKind, ValidationError,
};
pub use ids::ConversationId;
pub use state_machine::StateMachine;
