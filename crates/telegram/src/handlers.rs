use {
    teloxide::types::{Message, Update, UpdateKind},
    tgrelay_channels::Inbound,
    tgrelay_common::InboundEvent,
};

/// Sender name used when Telegram gives none.
const DEFAULT_SENDER_NAME: &str = "User";

/// Classify a polled update. Only plain messages reach the relay.
pub fn update_to_inbound(update: Update) -> Inbound {
    match update.kind {
        UpdateKind::Message(msg) => message_to_inbound(&msg),
        _ => Inbound::ignored("non-message update"),
    }
}

/// Turn a Telegram message into a relay event. Messages without text
/// (photos, stickers, voice, service messages) are ignored.
pub fn message_to_inbound(msg: &Message) -> Inbound {
    let Some(text) = msg.text() else {
        return Inbound::ignored("non-text message");
    };
    let sender_name = msg
        .from
        .as_ref()
        .map(|user| user.first_name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_SENDER_NAME);

    InboundEvent::new(msg.chat.id.0, sender_name, text, msg.id.0.to_string())
        .with_received_at(msg.date)
        .into()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn message(body: serde_json::Value) -> Message {
        serde_json::from_value(body).expect("deserialize message")
    }

    #[test]
    fn text_message_becomes_event() {
        let msg = message(json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": -100123, "type": "supergroup", "title": "Team" },
            "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
            "text": "hello"
        }));

        let Inbound::Message(event) = message_to_inbound(&msg) else {
            panic!("expected a message");
        };
        assert_eq!(event.conversation_id.as_str(), "-100123");
        assert_eq!(event.sender_name, "Alice");
        assert_eq!(event.text, "hello");
        assert_eq!(event.message_id, "7");
        assert_eq!(event.received_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_sender_falls_back_to_user() {
        let msg = message(json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": -100500, "type": "channel", "title": "News" },
            "text": "post"
        }));

        let Inbound::Message(event) = message_to_inbound(&msg) else {
            panic!("expected a message");
        };
        assert_eq!(event.sender_name, "User");
    }

    #[test]
    fn location_is_ignored() {
        let msg = message(json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": 42, "type": "private", "first_name": "Alice" },
            "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
            "location": { "latitude": 48.8566, "longitude": 2.3522 }
        }));

        assert!(matches!(message_to_inbound(&msg), Inbound::Ignored { .. }));
    }

    #[test]
    fn edited_message_update_is_ignored() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 10,
            "edited_message": {
                "message_id": 1,
                "date": 1,
                "edit_date": 2,
                "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
                "text": "edited"
            }
        }))
        .expect("deserialize update");

        assert_eq!(
            update_to_inbound(update),
            Inbound::ignored("non-message update")
        );
    }

    #[test]
    fn message_update_is_forwarded() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 11,
            "message": {
                "message_id": 3,
                "date": 1,
                "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
                "text": "/clear"
            }
        }))
        .expect("deserialize update");

        assert!(matches!(
            update_to_inbound(update),
            Inbound::Message(ref event) if event.text == "/clear"
        ));
    }
}
