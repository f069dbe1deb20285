//! The relay's orchestrating core.
//!
//! [`Dispatcher::ingest`] classifies each inbound update on the ingestion
//! loop and returns as soon as the update is dropped, answered, rejected or
//! handed to the worker pool. Completion and delivery run on the pool.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use {
    tgrelay_channels::{ChannelOutbound, Inbound, Markup},
    tgrelay_common::{ConversationId, InboundEvent, Turn},
    tgrelay_config::RelayConfig,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use tgrelay_metrics::{
    completion as completion_metrics, counter, histogram, labels, relay as relay_metrics,
};

use crate::{
    chunker,
    commands::{self, Command},
    completion::{CompletionClient, CompletionRequest},
    delivery::deliver,
    formatter::{Formatter, formatter_for},
    memory::ConversationMemory,
    rate_limit::RateLimiter,
    worker::{SubmitError, WorkerPool},
};

pub const RATE_LIMITED_NOTICE: &str = "You're sending messages too fast. Please wait a moment.";
pub const BUSY_NOTICE: &str = "I'm handling a lot of messages right now. Please try again in a moment.";
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

/// What the ingestion loop did with one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not a text message; nothing was sent.
    Dropped,
    /// Answered directly by a control command.
    Command(Command),
    /// Over the conversation's rate limit; a notice was sent.
    Rejected,
    /// Admitted but the worker queue was full; a notice was sent.
    Busy,
    /// Handed to the worker pool.
    Scheduled,
}

/// Terminal state of one admitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Collaborators shared by the ingestion loop and every worker.
struct Pipeline {
    limiter: RateLimiter,
    memory: Arc<dyn ConversationMemory>,
    completion: Arc<dyn CompletionClient>,
    outbound: Arc<dyn ChannelOutbound>,
    formatter: Arc<dyn Formatter>,
    max_message_len: usize,
}

pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
}

impl Dispatcher {
    /// Build the pipeline from config. Starts the worker pool, so this must
    /// run inside a Tokio runtime.
    #[must_use]
    pub fn new(
        config: &RelayConfig,
        completion: Arc<dyn CompletionClient>,
        outbound: Arc<dyn ChannelOutbound>,
        memory: Arc<dyn ConversationMemory>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                limiter: RateLimiter::new(config.rate_limit),
                memory,
                completion,
                outbound,
                formatter: formatter_for(config.outbound.formatter),
                max_message_len: config.outbound.max_message_len,
            }),
            pool: WorkerPool::new(config.workers),
        }
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.pipeline.limiter
    }

    /// Classify one update. Never fails: every error is logged and, where
    /// the user should know, answered with a notice.
    pub async fn ingest(&self, inbound: Inbound) -> Disposition {
        let event = match inbound {
            Inbound::Message(event) => event,
            Inbound::Ignored { reason } => {
                debug!(reason, "ignoring update");
                return Disposition::Dropped;
            },
        };
        let id = event.conversation_id.clone();

        debug!(
            conversation_id = %id,
            message_id = %event.message_id,
            sender = %event.sender_name,
            text_len = event.text.len(),
            "message received"
        );
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

        if let Some(command) = Command::parse(&event.text) {
            self.pipeline.handle_command(&id, command).await;
            return Disposition::Command(command);
        }

        if !self.pipeline.limiter.try_admit(&id) {
            info!(conversation_id = %id, "rate limited");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::RATE_LIMITED_TOTAL).increment(1);
            self.pipeline.notify(&id, RATE_LIMITED_NOTICE).await;
            return Disposition::Rejected;
        }

        let pipeline = Arc::clone(&self.pipeline);
        match self.pool.submit(id.clone(), async move {
            pipeline.process(event).await;
        }) {
            Ok(()) => Disposition::Scheduled,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "cannot schedule message");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::QUEUE_FULL_TOTAL).increment(1);
                if e == SubmitError::Full {
                    self.pipeline.notify(&id, BUSY_NOTICE).await;
                }
                Disposition::Busy
            },
        }
    }

    /// Run the worker half of the pipeline inline. The pool runs this for
    /// every scheduled message.
    pub async fn process(&self, event: InboundEvent) -> Outcome {
        self.pipeline.process(event).await
    }

    /// Stop accepting messages and wait up to `grace` for in-flight work.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.pool.shutdown(grace).await
    }
}

impl Pipeline {
    async fn process(&self, event: InboundEvent) -> Outcome {
        let id = &event.conversation_id;
        let outcome = self.run(&event).await;

        if outcome == Outcome::Failed {
            self.notify(id, APOLOGY).await;
        }
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::RUNS_TOTAL, labels::OUTCOME => outcome.as_str()).increment(1);
        debug!(conversation_id = %id, outcome = outcome.as_str(), "message processed");
        outcome
    }

    async fn run(&self, event: &InboundEvent) -> Outcome {
        let id = &event.conversation_id;

        if let Err(e) = self.outbound.send_typing(id).await {
            debug!(conversation_id = %id, error = %e, "typing indicator failed");
        }

        let history = self.memory.history(id).await;
        let started = Instant::now();
        let result = self
            .completion
            .complete(CompletionRequest {
                conversation_id: id,
                text: &event.text,
                history: &history,
            })
            .await;
        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        {
            let outcome = if result.is_ok() { "ok" } else { "error" };
            counter!(completion_metrics::REQUESTS_TOTAL, labels::OUTCOME => outcome).increment(1);
            histogram!(completion_metrics::DURATION_SECONDS).record(elapsed.as_secs_f64());
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    conversation_id = %id,
                    history_len = history.len(),
                    error = %e,
                    "completion failed"
                );
                return Outcome::Failed;
            },
        };
        debug!(
            conversation_id = %id,
            reply_len = reply.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "completion done"
        );

        self.memory
            .record_exchange(id, Turn::user(event), Turn::assistant(reply.as_str()))
            .await;

        let chunks = chunker::split(&reply, self.max_message_len);
        let total = chunks.len();
        for (index, chunk) in chunks.iter().enumerate() {
            match deliver(self.outbound.as_ref(), self.formatter.as_ref(), id, chunk).await {
                Ok(how) => {
                    debug!(conversation_id = %id, chunk = index + 1, chunks = total, ?how, "chunk sent");
                    #[cfg(feature = "metrics")]
                    counter!(relay_metrics::CHUNKS_SENT_TOTAL).increment(1);
                },
                Err(e) => {
                    error!(
                        conversation_id = %id,
                        chunk = index + 1,
                        chunks = total,
                        error = %e,
                        "send failed, abandoning remaining chunks"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(relay_metrics::DELIVERY_FAILURES_TOTAL).increment(1);
                    return Outcome::Failed;
                },
            }
        }

        info!(conversation_id = %id, chunks = total, "reply delivered");
        Outcome::Completed
    }

    async fn handle_command(&self, id: &ConversationId, command: Command) {
        info!(conversation_id = %id, command = command.name(), "command");
        #[cfg(feature = "metrics")]
        counter!(relay_metrics::COMMANDS_TOTAL, labels::COMMAND => command.name()).increment(1);

        let reply = match command {
            Command::Start | Command::Help => commands::GREETING.to_string(),
            Command::Clear => {
                self.memory.clear(id).await;
                commands::HISTORY_CLEARED.to_string()
            },
            Command::Tools => commands::tools_reply(&self.completion.capabilities()),
        };
        self.notify(id, &reply).await;
    }

    /// Plain-text reply outside the completion path. Failures are logged only.
    async fn notify(&self, id: &ConversationId, text: &str) {
        if let Err(e) = self.outbound.send(id, text, Markup::Plain).await {
            warn!(conversation_id = %id, error = %e, "failed to send notice");
        }
    }
}
