use tgrelay_common::InboundEvent;

/// A transport update after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message from a user.
    Message(InboundEvent),
    /// Anything the relay does not handle: edits, stickers, photos without
    /// a caption, service messages. Dropped without a reply.
    Ignored { reason: &'static str },
}

impl Inbound {
    #[must_use]
    pub fn ignored(reason: &'static str) -> Self {
        Self::Ignored { reason }
    }
}

impl From<InboundEvent> for Inbound {
    fn from(event: InboundEvent) -> Self {
        Self::Message(event)
    }
}
