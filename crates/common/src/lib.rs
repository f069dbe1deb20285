//! Shared types, error definitions, and utilities used across all tgrelay crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::{ConversationId, InboundEvent, Role, Turn, TurnMetadata},
};
