//! Bounded worker pool for admitted messages.
//!
//! Submissions go through a bounded queue. A scheduler task pulls units off
//! the queue only when a run permit is free, so a saturated pool backs the
//! queue up and further submissions fail fast with [`SubmitError::Full`].

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use {
    dashmap::DashMap,
    tgrelay_common::ConversationId,
    tgrelay_config::{OrderingMode, WorkerConfig},
    tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot},
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use tgrelay_metrics::{gauge, relay as relay_metrics};

pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    Full,
    #[error("worker pool is shut down")]
    Closed,
}

struct Unit {
    conversation_id: ConversationId,
    job: Job,
}

type Tails = Arc<DashMap<ConversationId, (u64, oneshot::Receiver<()>)>>;

pub struct WorkerPool {
    tx: mpsc::Sender<Unit>,
    tails: Tails,
    tracker: TaskTracker,
    closing: CancellationToken,
}

impl WorkerPool {
    /// Start the scheduler. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let tracker = TaskTracker::new();
        let closing = CancellationToken::new();
        let tails: Tails = Arc::new(DashMap::new());

        let scheduler = Scheduler {
            rx,
            ordering: config.ordering,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            tails: Arc::clone(&tails),
            next_seq: 0,
            tracker: tracker.clone(),
            closing: closing.clone(),
        };
        tracker.spawn(scheduler.run());

        debug!(
            max_concurrent = config.max_concurrent,
            queue_depth = config.queue_depth,
            ordering = ?config.ordering,
            "worker pool started"
        );
        Self {
            tx,
            tails,
            tracker,
            closing,
        }
    }

    /// Queue a unit of work without waiting.
    pub fn submit(
        &self,
        conversation_id: ConversationId,
        job: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), SubmitError> {
        if self.closing.is_cancelled() {
            return Err(SubmitError::Closed);
        }
        self.tx
            .try_send(Unit {
                conversation_id,
                job: Box::pin(job),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::Full,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            })
    }

    /// Conversations with a unit still scheduled under per-conversation
    /// ordering.
    #[must_use]
    pub fn chained_conversations(&self) -> usize {
        self.tails.len()
    }

    /// Stop accepting work, run what is already queued, and wait up to
    /// `grace` for everything to finish. Returns `false` if work was
    /// abandoned.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.closing.cancel();
        self.tracker.close();

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("worker pool drained");
            true
        } else {
            warn!(
                abandoned = self.tracker.len(),
                grace_secs = grace.as_secs(),
                "shutdown grace period elapsed, abandoning in-flight work"
            );
            false
        }
    }
}

struct Scheduler {
    rx: mpsc::Receiver<Unit>,
    ordering: OrderingMode,
    permits: Arc<Semaphore>,
    /// Last unit scheduled per conversation, used to chain the next one
    /// behind it when ordering is per conversation.
    tails: Tails,
    next_seq: u64,
    tracker: TaskTracker,
    closing: CancellationToken,
}

impl Scheduler {
    async fn run(mut self) {
        let mut draining = false;
        loop {
            let unit = tokio::select! {
                unit = self.rx.recv() => unit,
                () = self.closing.cancelled(), if !draining => {
                    draining = true;
                    self.rx.close();
                    continue;
                },
            };
            let Some(unit) = unit else {
                break;
            };
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            self.dispatch(unit, permit);
        }
        debug!("worker scheduler stopped");
    }

    fn dispatch(&mut self, unit: Unit, permit: OwnedSemaphorePermit) {
        let Unit {
            conversation_id,
            job,
        } = unit;

        match self.ordering {
            OrderingMode::Concurrent => {
                self.tracker.spawn(run_unit(job, permit));
            },
            OrderingMode::PerConversation => {
                // Permits are taken in admission order, so a predecessor
                // always holds one already and waiting on it cannot deadlock.
                self.next_seq += 1;
                let seq = self.next_seq;
                let (done_tx, done_rx) = oneshot::channel::<()>();
                let previous = self
                    .tails
                    .insert(conversation_id.clone(), (seq, done_rx))
                    .map(|(_, rx)| rx);
                let tail = TailGuard {
                    tails: Arc::clone(&self.tails),
                    conversation_id,
                    seq,
                };

                self.tracker.spawn(async move {
                    // Released on unwind too, so a panicking job leaves no entry.
                    let _tail = tail;
                    if let Some(previous) = previous {
                        // Err means the predecessor panicked; carry on.
                        let _ = previous.await;
                    }
                    run_unit(job, permit).await;
                    let _ = done_tx.send(());
                });
            },
        }
    }
}

/// Drops the conversation's tail entry if it still points at this unit.
struct TailGuard {
    tails: Tails,
    conversation_id: ConversationId,
    seq: u64,
}

impl Drop for TailGuard {
    fn drop(&mut self) {
        let seq = self.seq;
        self.tails
            .remove_if(&self.conversation_id, |_, (tail, _)| *tail == seq);
    }
}

async fn run_unit(job: Job, _permit: OwnedSemaphorePermit) {
    #[cfg(feature = "metrics")]
    gauge!(relay_metrics::WORKERS_ACTIVE).increment(1.0);

    job.await;

    #[cfg(feature = "metrics")]
    gauge!(relay_metrics::WORKERS_ACTIVE).decrement(1.0);
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    fn pool(max_concurrent: usize, queue_depth: usize, ordering: OrderingMode) -> WorkerPool {
        WorkerPool::new(WorkerConfig {
            max_concurrent,
            queue_depth,
            ordering,
            shutdown_grace_secs: 5,
        })
    }

    #[tokio::test]
    async fn full_queue_is_reported_without_blocking() {
        // Current-thread runtime: the scheduler cannot run between the two
        // submissions, so the second one finds the single slot taken.
        let pool = pool(1, 1, OrderingMode::Concurrent);
        let id = ConversationId::from(1_i64);
        assert_eq!(pool.submit(id.clone(), async {}), Ok(()));
        assert_eq!(pool.submit(id, async {}), Err(SubmitError::Full));
        assert!(pool.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn running_units_are_bounded() {
        let pool = pool(2, 16, OrderingMode::Concurrent);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for n in 0..6_i64 {
            let (running, peak, done) = (
                Arc::clone(&running),
                Arc::clone(&peak),
                Arc::clone(&done),
            );
            pool.submit(ConversationId::from(n), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn per_conversation_runs_in_admission_order() {
        let pool = pool(4, 16, OrderingMode::PerConversation);
        let order = Arc::new(Mutex::new(Vec::new()));
        let id = ConversationId::from(42_i64);

        for n in 0..4_u64 {
            let order = Arc::clone(&order);
            pool.submit(id.clone(), async move {
                // Earlier units sleep longer; without chaining they would
                // finish last.
                tokio::time::sleep(Duration::from_millis(40 - n * 10)).await;
                order.lock().unwrap().push(n);
            })
            .unwrap();
        }

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_unit_does_not_stall_its_conversation() {
        let pool = pool(2, 4, OrderingMode::PerConversation);
        let id = ConversationId::from(7_i64);
        let ran = Arc::new(AtomicUsize::new(0));

        async fn explode() {
            panic!("boom");
        }

        pool.submit(id.clone(), explode()).unwrap();
        let ran2 = Arc::clone(&ran);
        pool.submit(id, async move {
            ran2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicking_unit_releases_its_tail() {
        let pool = pool(2, 4, OrderingMode::PerConversation);

        async fn explode() {
            panic!("boom");
        }

        pool.submit(ConversationId::from(9_i64), explode()).unwrap();
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(pool.chained_conversations(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn finished_conversations_leave_no_tail() {
        let pool = pool(2, 8, OrderingMode::PerConversation);
        for n in 0..3_i64 {
            pool.submit(ConversationId::from(n), async {}).unwrap();
            pool.submit(ConversationId::from(n), async {}).unwrap();
        }
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(pool.chained_conversations(), 0);
    }

    #[tokio::test]
    async fn shutdown_abandons_stuck_work_and_refuses_new() {
        let pool = pool(1, 1, OrderingMode::Concurrent);
        let id = ConversationId::from(1_i64);
        pool.submit(id.clone(), std::future::pending::<()>()).unwrap();
        tokio::task::yield_now().await;

        assert!(!pool.shutdown(Duration::from_millis(50)).await);
        assert_eq!(pool.submit(id, async {}), Err(SubmitError::Closed));
    }
}
