use std::fmt;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

/// Stable identifier of one conversation (a Telegram chat id, rendered as text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form used by transports that address chats by integer id.
    pub fn as_i64(&self) -> Result<i64> {
        self.0
            .parse::<i64>()
            .map_err(|_| Error::InvalidConversationId(self.0.clone()))
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self::new(id.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One user message as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub conversation_id: ConversationId,
    /// Display name of the sender ("User" when the transport has none).
    pub sender_name: String,
    pub text: String,
    /// Transport-assigned message id, kept for logging and history metadata.
    pub message_id: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        sender_name: impl Into<String>,
        text: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender_name: sender_name.into(),
            text: text.into(),
            message_id: message_id.into(),
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Sender details carried by user turns only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub sender_name: String,
    pub message_id: String,
}

/// One entry of a conversation's bounded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TurnMetadata>,
}

impl Turn {
    /// User turn built from the inbound event that carried it.
    #[must_use]
    pub fn user(event: &InboundEvent) -> Self {
        Self {
            role: Role::User,
            content: event.text.clone(),
            timestamp: event.received_at,
            metadata: Some(TurnMetadata {
                sender_name: event.sender_name.clone(),
                message_id: event.message_id.clone(),
            }),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}
