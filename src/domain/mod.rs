//! Domain layer containing the conversation engine.
//!
//! # Module Organization
//!
//! - `foundation` - Identifiers, error taxonomy, lifecycle trait
//! - `conversation` - Conversation entity, options resolution, cleanup chain
//! - `media` - Media inputs and staging helpers
//! - `retry` - Nested backoff retry scopes

pub mod conversation;
pub mod foundation;
pub mod media;
pub mod retry;
