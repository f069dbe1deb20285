//! Metric name and label definitions.
//!
//! All metric names recorded by tgrelay crates are declared here so the set of
//! exported series is documented in one place.

/// Relay pipeline metrics (dispatcher, admission control, delivery)
pub mod relay {
    /// Inbound text messages accepted by the ingestion loop
    pub const MESSAGES_RECEIVED_TOTAL: &str = "tgrelay_relay_messages_received_total";
    /// Messages rejected by per-conversation admission control
    pub const RATE_LIMITED_TOTAL: &str = "tgrelay_relay_rate_limited_total";
    /// Messages turned away because the worker queue was full
    pub const QUEUE_FULL_TOTAL: &str = "tgrelay_relay_queue_full_total";
    /// Control commands handled, labelled by `command`
    pub const COMMANDS_TOTAL: &str = "tgrelay_relay_commands_total";
    /// Completed pipeline runs, labelled by `outcome` (completed / failed)
    pub const RUNS_TOTAL: &str = "tgrelay_relay_runs_total";
    /// Chunks delivered to the transport
    pub const CHUNKS_SENT_TOTAL: &str = "tgrelay_relay_chunks_sent_total";
    /// Chunks that needed the unformatted fallback send
    pub const FALLBACK_SENDS_TOTAL: &str = "tgrelay_relay_fallback_sends_total";
    /// Chunks that could not be delivered even after fallback
    pub const DELIVERY_FAILURES_TOTAL: &str = "tgrelay_relay_delivery_failures_total";
    /// Units currently running in the worker pool
    pub const WORKERS_ACTIVE: &str = "tgrelay_relay_workers_active";
}

/// Completion engine metrics
pub mod completion {
    /// Completion requests, labelled by `outcome` (ok / error)
    pub const REQUESTS_TOTAL: &str = "tgrelay_completion_requests_total";
    /// Completion request duration in seconds
    pub const DURATION_SECONDS: &str = "tgrelay_completion_duration_seconds";
}

/// Telegram transport metrics
pub mod telegram {
    /// Updates pulled from getUpdates
    pub const UPDATES_RECEIVED_TOTAL: &str = "tgrelay_telegram_updates_received_total";
    /// Bot API requests that hit a `retry_after` flood-control response
    pub const RETRY_AFTER_TOTAL: &str = "tgrelay_telegram_retry_after_total";
    /// getUpdates failures
    pub const POLLING_ERRORS_TOTAL: &str = "tgrelay_telegram_polling_errors_total";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const COMMAND: &str = "command";
}

/// Histogram buckets
pub mod buckets {
    /// Completion latency: engines routinely take several seconds.
    pub const COMPLETION_DURATION: [f64; 10] =
        [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 15.0, 30.0, 60.0, 120.0];
}
