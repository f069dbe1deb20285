//! Seam to the completion engine.

use {
    async_trait::async_trait,
    serde::Serialize,
    tgrelay_common::{ConversationId, Turn},
};

/// One completion call: the new user text plus the history that precedes it.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub conversation_id: &'a ConversationId,
    pub text: &'a str,
    pub history: &'a [Turn],
}

/// A capability the engine exposes, listed by `/tools`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The engine answered with a non-success status.
    #[error("completion API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, timeout, TLS).
    #[error("completion request failed: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The response could not be decoded.
    #[error("invalid completion response: {message}")]
    InvalidResponse { message: String },
}

impl CompletionError {
    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid_response(message: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            message: message.to_string(),
        }
    }
}

/// Stateless request/response client for the completion engine.
///
/// Failures are returned once; the relay never retries them.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, CompletionError>;

    /// Tools or other capabilities the engine can use on the user's behalf.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }
}
