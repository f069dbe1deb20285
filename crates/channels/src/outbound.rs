use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tgrelay_common::ConversationId,
};

use crate::Result;

/// Markup dialect of an outgoing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Markup {
    /// No parsing; the text is shown verbatim.
    Plain,
    /// Telegram legacy Markdown.
    Markdown,
    Html,
}

/// Send messages to a conversation.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send one message. Returns [`crate::Error::Markup`] when the transport
    /// refused the payload because of its formatting.
    async fn send(&self, to: &ConversationId, text: &str, markup: Markup) -> Result<()>;

    /// Send a "typing" indicator. Best-effort; callers ignore failures.
    async fn send_typing(&self, _to: &ConversationId) -> Result<()> {
        Ok(())
    }
}
