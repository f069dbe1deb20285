use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{ChatAction, ChatId, ParseMode},
    },
    tgrelay_channels::{ChannelOutbound, Error as ChannelError, Markup},
    tgrelay_common::ConversationId,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use tgrelay_metrics::{counter, telegram as tg_metrics};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// API error fragments that mean the payload's formatting was refused.
/// Matched against both the rendered and the debug form of the error, since
/// teloxide maps some descriptions to dedicated variants.
const MARKUP_REJECTIONS: &[&str] = &[
    "can't parse entities",
    "cantparseentities",
    "message is too long",
    "messageistoolong",
];

/// Outbound message sender for Telegram.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_telegram_request_with_retry<T, F, Fut>(
        &self,
        chat_id: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };
                    #[cfg(feature = "metrics")]
                    counter!(tg_metrics::RETRY_AFTER_TOTAL).increment(1);

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = chat_id.0,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send(&self, to: &ConversationId, text: &str, markup: Markup) -> tgrelay_channels::Result<()> {
        let chat_id = ChatId(to.as_i64()?);
        let parse_mode = parse_mode(markup);

        let result = self
            .run_telegram_request_with_retry(chat_id, "send message", || {
                let mut req = self.bot.send_message(chat_id, text);
                if let Some(mode) = parse_mode {
                    req = req.parse_mode(mode);
                }
                async move { req.await }
            })
            .await;

        match result {
            Ok(message) => {
                debug!(chat_id = chat_id.0, message_id = message.id.0, ?markup, "telegram message sent");
                Ok(())
            },
            Err(e) => Err(classify_send_error(e)),
        }
    }

    async fn send_typing(&self, to: &ConversationId) -> tgrelay_channels::Result<()> {
        let chat_id = ChatId(to.as_i64()?);
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .map_err(|e| ChannelError::external("send chat action", e))?;
        Ok(())
    }
}

#[allow(deprecated)]
fn parse_mode(markup: Markup) -> Option<ParseMode> {
    match markup {
        Markup::Plain => None,
        // Legacy Markdown: lenient enough for typical model output.
        Markup::Markdown => Some(ParseMode::Markdown),
        Markup::Html => Some(ParseMode::Html),
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn classify_send_error(error: RequestError) -> ChannelError {
    if let RequestError::Api(api) = &error {
        let rendered = format!("{api} {api:?}").to_lowercase();
        if MARKUP_REJECTIONS.iter().any(|needle| rendered.contains(needle)) {
            return ChannelError::markup(api);
        }
    }
    ChannelError::external("send message", error)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{MockTelegramApi, api_error, happy_path, ok, sent_message},
        serde_json::json,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    const CANT_PARSE: &str =
        "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 0";

    #[tokio::test]
    async fn sends_with_parse_mode() {
        let api = MockTelegramApi::start(happy_path).await;
        let outbound = TelegramOutbound::new(api.bot.clone());
        let id = ConversationId::from(42_i64);

        outbound.send(&id, "*hi*", Markup::Markdown).await.unwrap();
        outbound.send(&id, "<b>hi</b>", Markup::Html).await.unwrap();
        outbound.send(&id, "hi", Markup::Plain).await.unwrap();

        let sent = api.calls("sendmessage");
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0]["chat_id"], 42);
        assert_eq!(sent[0]["parse_mode"], "Markdown");
        assert_eq!(sent[1]["parse_mode"], "HTML");
        assert!(sent[2].get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn entity_errors_are_markup_rejections() {
        let api = MockTelegramApi::start(|method, body| match method {
            "sendmessage" if body.get("parse_mode").is_some() => api_error(400, CANT_PARSE),
            _ => happy_path(method, body),
        })
        .await;
        let outbound = TelegramOutbound::new(api.bot.clone());
        let id = ConversationId::from(42_i64);

        let err = outbound.send(&id, "*oops", Markup::Markdown).await.unwrap_err();
        assert!(err.is_markup_rejection(), "{err}");
        outbound.send(&id, "*oops", Markup::Plain).await.unwrap();
    }

    #[tokio::test]
    async fn other_api_errors_are_failures() {
        let api = MockTelegramApi::start(|_, _| api_error(400, "Bad Request: chat not found")).await;
        let outbound = TelegramOutbound::new(api.bot.clone());

        let err = outbound
            .send(&ConversationId::from(1_i64), "hi", Markup::Plain)
            .await
            .unwrap_err();
        assert!(!err.is_markup_rejection());
    }

    #[tokio::test]
    async fn non_numeric_conversation_is_invalid_input() {
        let api = MockTelegramApi::start(happy_path).await;
        let outbound = TelegramOutbound::new(api.bot.clone());

        let err = outbound
            .send(&ConversationId::new("alice"), "hi", Markup::Plain)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidInput { .. }));
        assert!(api.calls("sendmessage").is_empty());
    }

    #[tokio::test]
    async fn retry_after_is_waited_out() {
        let attempts = AtomicUsize::new(0);
        let api = MockTelegramApi::start(move |method, body| {
            if method == "sendmessage" && attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    json!({
                        "ok": false,
                        "error_code": 429,
                        "description": "Too Many Requests: retry after 1",
                        "parameters": { "retry_after": 1 }
                    }),
                );
            }
            ok(sent_message(body))
        })
        .await;
        let outbound = TelegramOutbound::new(api.bot.clone());

        outbound
            .send(&ConversationId::from(42_i64), "hi", Markup::Plain)
            .await
            .unwrap();
        assert_eq!(api.calls("sendmessage").len(), 2);
    }

    #[tokio::test]
    async fn typing_uses_chat_action() {
        let api = MockTelegramApi::start(happy_path).await;
        let outbound = TelegramOutbound::new(api.bot.clone());

        outbound.send_typing(&ConversationId::from(42_i64)).await.unwrap();
        let actions = api.calls("sendchataction");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["action"], "typing");
    }
}
