//! Bounded per-conversation history.

use std::collections::VecDeque;

use {
    async_trait::async_trait,
    dashmap::DashMap,
    tgrelay_common::{ConversationId, Turn},
};

/// History store keyed by conversation.
///
/// Implementations keep at most a fixed number of turns per conversation,
/// evicting the oldest first.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    /// Snapshot of the stored turns, oldest first.
    async fn history(&self, id: &ConversationId) -> Vec<Turn>;

    /// Append a user turn and its assistant reply as one operation. A reader
    /// never observes the user turn without its reply.
    async fn record_exchange(&self, id: &ConversationId, user: Turn, assistant: Turn);

    async fn clear(&self, id: &ConversationId);

    async fn len(&self, id: &ConversationId) -> usize;
}

/// Process-lifetime history held in memory.
pub struct InMemoryConversationMemory {
    max_turns: usize,
    conversations: DashMap<ConversationId, VecDeque<Turn>>,
}

impl InMemoryConversationMemory {
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            conversations: DashMap::new(),
        }
    }
}

#[async_trait]
impl ConversationMemory for InMemoryConversationMemory {
    async fn history(&self, id: &ConversationId) -> Vec<Turn> {
        self.conversations
            .get(id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn record_exchange(&self, id: &ConversationId, user: Turn, assistant: Turn) {
        let mut turns = self.conversations.entry(id.clone()).or_default();
        turns.push_back(user);
        turns.push_back(assistant);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    async fn clear(&self, id: &ConversationId) {
        self.conversations.remove(id);
    }

    async fn len(&self, id: &ConversationId) -> usize {
        self.conversations.get(id).map_or(0, |turns| turns.len())
    }
}
