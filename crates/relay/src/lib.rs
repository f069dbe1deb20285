//! Message relay pipeline.
//!
//! Inbound text messages are admitted per conversation, processed on a
//! bounded worker pool against a [`CompletionClient`], and the reply is split
//! into transport-sized chunks that are delivered in order, falling back to
//! plain text when the transport rejects the formatted payload.

pub mod chunker;
pub mod commands;
pub mod completion;
pub mod delivery;
pub mod dispatcher;
pub mod formatter;
pub mod memory;
pub mod rate_limit;
pub mod worker;

pub use {
    commands::Command,
    completion::{Capability, CompletionClient, CompletionError, CompletionRequest},
    delivery::{Delivered, deliver},
    dispatcher::{Dispatcher, Disposition, Outcome},
    formatter::{Formatter, Passthrough, TelegramHtml, formatter_for},
    memory::{ConversationMemory, InMemoryConversationMemory},
    rate_limit::RateLimiter,
    worker::{SubmitError, WorkerPool},
};
