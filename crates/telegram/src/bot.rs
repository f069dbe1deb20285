use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tgrelay_config::TelegramConfig,
    tgrelay_relay::{Command, Dispatcher},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tgrelay_metrics::{counter, telegram as tg_metrics};

use crate::{error::Result, handlers};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Why the polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Cancelled,
    /// Another process is polling with the same token.
    Conflict,
}

/// A running polling loop.
pub struct Polling {
    pub cancel: CancellationToken,
    pub task: JoinHandle<PollExit>,
}

/// Build a bot whose HTTP timeout outlasts the long-poll timeout, so the
/// client never aborts a getUpdates call Telegram is still holding open.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    Ok(Bot::with_client(config.token.expose_secret(), client))
}

/// Verify the bot, prepare it for long polling, and spawn the polling loop.
///
/// Updates are handed to the dispatcher one at a time, in order. The loop
/// runs until `Polling::cancel` is cancelled or Telegram reports a conflict.
pub async fn start_polling(
    bot: Bot,
    config: &TelegramConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<Polling> {
    let me = bot.get_me().await?;

    // Long polling fails while a webhook is set.
    bot.delete_webhook().send().await?;

    if config.register_commands {
        let commands: Vec<_> = Command::ALL
            .iter()
            .map(|c| BotCommand::new(c.name(), c.description()))
            .collect();
        if let Err(e) = bot.set_my_commands(commands).await {
            warn!(error = %e, "failed to register bot commands");
        }
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_loop(
        bot,
        config.poll_timeout_secs,
        dispatcher,
        cancel.clone(),
    ));
    Ok(Polling { cancel, task })
}

async fn poll_loop(
    bot: Bot,
    poll_timeout_secs: u32,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> PollExit {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => {
                info!("telegram polling stopped");
                return PollExit::Cancelled;
            },
            result = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message])
                .send() => result,
        };

        match result {
            Ok(updates) => {
                if !updates.is_empty() {
                    debug!(count = updates.len(), "got telegram updates");
                }
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::UPDATES_RECEIVED_TOTAL).increment(updates.len() as u64);

                for update in updates {
                    offset = update.id.as_offset();
                    dispatcher.ingest(handlers::update_to_inbound(update)).await;
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling disabled: another instance is already running with this token");
                return PollExit::Conflict;
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::POLLING_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => return PollExit::Cancelled,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            outbound::TelegramOutbound,
            test_support::{MockTelegramApi, api_error, happy_path, ok},
        },
        async_trait::async_trait,
        serde_json::json,
        std::sync::atomic::{AtomicUsize, Ordering},
        tgrelay_channels::ChannelOutbound,
        tgrelay_config::RelayConfig,
        tgrelay_relay::{
            CompletionClient, CompletionError, CompletionRequest, ConversationMemory,
            InMemoryConversationMemory,
        },
    };

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> std::result::Result<String, CompletionError> {
            Ok(format!("you said: {}", request.text))
        }
    }

    fn dispatcher(bot: &Bot) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            &RelayConfig::default(),
            Arc::new(Echo),
            Arc::new(TelegramOutbound::new(bot.clone())) as Arc<dyn ChannelOutbound>,
            Arc::new(InMemoryConversationMemory::new(20)) as Arc<dyn ConversationMemory>,
        ))
    }

    async fn wait_for(api: &MockTelegramApi, method: &str, count: usize) {
        for _ in 0..200 {
            if api.calls(method).len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} {method} calls");
    }

    #[tokio::test]
    async fn polls_and_replies() {
        let polls = AtomicUsize::new(0);
        let api = MockTelegramApi::start(move |method, body| {
            if method == "getupdates" && polls.fetch_add(1, Ordering::SeqCst) == 0 {
                return ok(json!([{
                    "update_id": 10,
                    "message": {
                        "message_id": 5,
                        "date": 1,
                        "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                        "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
                        "text": "hello"
                    }
                }]));
            }
            happy_path(method, body)
        })
        .await;

        let dispatcher = dispatcher(&api.bot);
        let polling = start_polling(api.bot.clone(), &TelegramConfig::default(), Arc::clone(&dispatcher))
            .await
            .unwrap();

        wait_for(&api, "sendmessage", 1).await;
        wait_for(&api, "getupdates", 2).await;
        polling.cancel.cancel();
        assert_eq!(polling.task.await.unwrap(), PollExit::Cancelled);
        assert!(dispatcher.shutdown(Duration::from_secs(5)).await);

        assert_eq!(api.calls("deletewebhook").len(), 1);
        let commands = api.calls("setmycommands");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0]["commands"].as_array().unwrap().len(), Command::ALL.len());

        let sent = api.calls("sendmessage");
        assert_eq!(sent[0]["chat_id"], 42);
        assert_eq!(sent[0]["text"], "you said: hello");
        assert_eq!(api.calls("sendchataction").len(), 1);

        // The next poll acknowledges update 10.
        assert_eq!(api.calls("getupdates")[1]["offset"], 11);
    }

    #[tokio::test]
    async fn conflict_stops_polling() {
        let api = MockTelegramApi::start(|method, body| match method {
            "getupdates" => api_error(
                409,
                "Conflict: terminated by other getUpdates request; make sure that only one bot instance is running",
            ),
            _ => happy_path(method, body),
        })
        .await;

        let polling = start_polling(api.bot.clone(), &TelegramConfig::default(), dispatcher(&api.bot))
            .await
            .unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), polling.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, PollExit::Conflict);
    }

    #[tokio::test]
    async fn command_registration_can_be_disabled() {
        let api = MockTelegramApi::start(happy_path).await;
        let config = TelegramConfig {
            register_commands: false,
            ..Default::default()
        };

        let polling = start_polling(api.bot.clone(), &config, dispatcher(&api.bot))
            .await
            .unwrap();
        polling.cancel.cancel();
        assert_eq!(polling.task.await.unwrap(), PollExit::Cancelled);
        assert!(api.calls("setmycommands").is_empty());
    }

    #[tokio::test]
    async fn invalid_token_fails_startup() {
        let api = MockTelegramApi::start(|_, _| api_error(401, "Unauthorized")).await;
        assert!(
            start_polling(api.bot.clone(), &TelegramConfig::default(), dispatcher(&api.bot))
                .await
                .is_err()
        );
    }
}
