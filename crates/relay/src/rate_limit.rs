//! Per-conversation admission control.
//!
//! Each conversation owns a token bucket holding up to `capacity` tokens that
//! refills continuously at `capacity` per `window`. A message is admitted when
//! a whole token is available.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    dashmap::{DashMap, mapref::entry::Entry},
    tgrelay_common::ConversationId,
    tgrelay_config::RateLimitConfig,
};

const CLEANUP_EVERY_CALLS: u64 = 512;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    capacity: f64,
    window: Duration,
    buckets: Arc<DashMap<ConversationId, Bucket>>,
    calls_seen: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Zero values are raised to 1; `validate` reports them before startup.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            capacity: f64::from(config.capacity.max(1)),
            window: Duration::from_secs(config.window_secs.max(1)),
            buckets: Arc::new(DashMap::new()),
            calls_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn try_admit(&self, id: &ConversationId) -> bool {
        self.try_admit_at(id, Instant::now())
    }

    /// Refill for the time elapsed up to `now`, then try to take one token.
    ///
    /// The whole read-modify-write happens under the map's entry lock for
    /// `id`, so two callers racing for the last token cannot both win.
    pub fn try_admit_at(&self, id: &ConversationId, now: Instant) -> bool {
        let admitted = match self.buckets.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let bucket = occupied.get_mut();
                self.refill(bucket, now);
                take(bucket)
            },
            Entry::Vacant(vacant) => {
                let mut bucket = vacant.insert(Bucket {
                    tokens: self.capacity,
                    last_refill: now,
                });
                take(&mut bucket)
            },
        };

        self.cleanup_if_needed(now);
        admitted
    }

    /// Stored token count without applying refill. `None` for unseen ids.
    #[must_use]
    pub fn remaining(&self, id: &ConversationId) -> Option<f64> {
        self.buckets.get(id).map(|b| b.tokens)
    }

    /// Number of conversations with a live bucket.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let accrued = elapsed.as_secs_f64() * self.capacity / self.window.as_secs_f64();
        bucket.tokens = (bucket.tokens + accrued).min(self.capacity);
        bucket.last_refill = now;
    }

    // A bucket idle for a full window has refilled to capacity, so dropping
    // it is indistinguishable from keeping it.
    fn cleanup_if_needed(&self, now: Instant) {
        let seen = self.calls_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if !seen.is_multiple_of(CLEANUP_EVERY_CALLS) {
            return;
        }
        let window = self.window;
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < window);
    }
}

fn take(bucket: &mut Bucket) -> bool {
    if bucket.tokens >= 1.0 {
        bucket.tokens -= 1.0;
        true
    } else {
        false
    }
}
