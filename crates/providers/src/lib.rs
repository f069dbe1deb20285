//! Completion engine clients.

pub mod anthropic;
pub mod error;

pub use {
    anthropic::{AnthropicClient, FALLBACK_REPLY},
    error::{Error, Result},
};
