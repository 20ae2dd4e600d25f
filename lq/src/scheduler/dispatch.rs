//! Dispatch loop: releases eligible entries into the worker pool until quiescent

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::WorkItem;

use super::config::SchedulerConfig;
use super::pool::{PoolError, PoolStats, WorkerPool};
use super::queue::{EligibilityQueue, Extracted, QueueEntry};

/// Work performed for each released item
///
/// Implementations own their failures: the pool has no channel for reporting
/// them, so errors must be logged (and artifacts written) inside `handle`.
#[async_trait]
pub trait ItemHandler: Send + Sync + 'static {
    async fn handle(&self, item: WorkItem);
}

/// Dispatch loop state
///
/// `Draining` has no grace window of its own: the exhaustion timeout on the
/// next extraction is the grace period, since a worker re-insertion wakes it.
/// The state only tracks whether a dispatch was resumed by such a re-insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    /// Queue was empty after the last submission; waiting on worker re-insertions
    Draining,
    Stopped,
}

/// What a finished run did
#[derive(Debug, Default, Clone)]
pub struct DispatchSummary {
    pub dispatched: u64,
    /// Dispatches of items that had been re-staged at least once
    pub redispatched: u64,
    /// Times the loop found the queue empty and was revived by a worker re-insertion
    pub resumed: u64,
    /// Entries re-inserted by workers after the loop had stopped
    pub abandoned: usize,
    pub elapsed: Duration,
    pub pool: PoolStats,
}

/// Sleep interval for an entry that is `remaining` away from eligibility
///
/// Finer grained as the eligibility time approaches.
pub fn backoff(remaining: Duration) -> Duration {
    if remaining <= Duration::from_millis(100) {
        Duration::from_millis(1)
    } else if remaining <= Duration::from_millis(500) {
        Duration::from_millis(10)
    } else if remaining <= Duration::from_millis(1500) {
        Duration::from_millis(100)
    } else {
        Duration::from_secs(1)
    }
}

/// Pulls entries from the eligibility queue and runs them on a worker pool
pub struct Dispatcher<H: ItemHandler> {
    config: SchedulerConfig,
    queue: Arc<EligibilityQueue>,
    handler: Arc<H>,
}

impl<H: ItemHandler> Dispatcher<H> {
    pub fn new(config: SchedulerConfig, queue: Arc<EligibilityQueue>, handler: Arc<H>) -> Self {
        debug!(?config, "Dispatcher::new: called");
        Self { config, queue, handler }
    }

    /// Run until the queue stays empty for the configured timeout
    ///
    /// The pool is always drained before returning, including when dispatch
    /// fails part way.
    pub async fn run(&self) -> Result<DispatchSummary> {
        debug!("Dispatcher::run: called");
        let started = Instant::now();
        let mut pool = WorkerPool::new(self.config.max_workers).context("Failed to create worker pool")?;
        let mut summary = DispatchSummary::default();

        let result = self.dispatch(&mut pool, &mut summary).await;

        summary.pool = pool.shutdown_and_wait().await;
        summary.abandoned = self.queue.len().await;
        if summary.abandoned > 0 {
            warn!(
                abandoned = summary.abandoned,
                "Entries were re-staged after the queue timed out and will not be dispatched this run"
            );
        }
        summary.elapsed = started.elapsed();

        result.context("Dispatch loop failed")?;
        info!(
            dispatched = summary.dispatched,
            redispatched = summary.redispatched,
            resumed = summary.resumed,
            elapsed = ?summary.elapsed,
            "Dispatch complete"
        );
        Ok(summary)
    }

    async fn dispatch(&self, pool: &mut WorkerPool, summary: &mut DispatchSummary) -> Result<(), PoolError> {
        let timeout = self.config.queue_timeout();
        let mut state = DispatchState::Running;

        loop {
            let entry = match self.queue.extract_earliest(timeout).await {
                Extracted::Entry(entry) => entry,
                Extracted::TimedOut => {
                    state = transition(state, DispatchState::Stopped);
                    info!(?timeout, ?state, "Queue empty for the full timeout, stopping");
                    return Ok(());
                }
            };
            if state == DispatchState::Draining {
                state = transition(state, DispatchState::Running);
                summary.resumed += 1;
            }

            let entry = self.wait_until_eligible(entry).await;
            let item = entry.item;

            info!(
                email = %item.lookup_value,
                id = %item.identity,
                attempt = item.attempt,
                "Submit | submit {} for execution",
                item.lookup_value
            );
            if item.attempt > 0 {
                summary.redispatched += 1;
            }

            let handler = Arc::clone(&self.handler);
            pool.submit(async move { handler.handle(item).await }).await?;
            summary.dispatched += 1;

            if state == DispatchState::Running && self.queue.is_empty().await {
                state = transition(state, DispatchState::Draining);
            }
        }
    }

    /// Hold an entry until its eligibility time, giving way to anything earlier
    async fn wait_until_eligible(&self, mut entry: QueueEntry) -> QueueEntry {
        loop {
            let now = Instant::now();
            if entry.is_eligible(now) {
                return entry;
            }
            tokio::time::sleep(backoff(entry.remaining(now))).await;
            entry = self.queue.requeue_and_extract(entry).await;
        }
    }
}

fn transition(from: DispatchState, to: DispatchState) -> DispatchState {
    debug!(?from, ?to, "Dispatcher: state transition");
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candidate;
    use chrono::NaiveDateTime;
    use tokio::sync::Mutex;

    fn item(sequence: u64) -> WorkItem {
        let dt = NaiveDateTime::parse_from_str("2016-06-03 19:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        WorkItem::new(sequence, Candidate::new(format!("{}", sequence), dt, format!("u{}@x.com", sequence)))
    }

    /// Records when each item was handed over
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u64, Instant)>>,
    }

    #[async_trait]
    impl ItemHandler for Recorder {
        async fn handle(&self, item: WorkItem) {
            self.seen.lock().await.push((item.sequence, Instant::now()));
        }
    }

    fn config(timeout_secs: u64) -> SchedulerConfig {
        SchedulerConfig {
            max_workers: 4,
            queue_timeout_secs: timeout_secs,
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_scale() {
        assert_eq!(backoff(Duration::from_millis(50)), Duration::from_millis(1));
        assert_eq!(backoff(Duration::from_millis(100)), Duration::from_millis(1));
        assert_eq!(backoff(Duration::from_millis(300)), Duration::from_millis(10));
        assert_eq!(backoff(Duration::from_millis(1200)), Duration::from_millis(100));
        assert_eq!(backoff(Duration::from_secs(20)), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_never_exceeds_remaining_beyond_a_millisecond() {
        for ms in 2..5000u64 {
            let remaining = Duration::from_millis(ms);
            assert!(backoff(remaining) < remaining);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_stops_after_one_timeout() {
        let queue = Arc::new(EligibilityQueue::new());
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(config(60), queue, Arc::clone(&recorder));

        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.resumed, 0);
        assert_eq!(summary.abandoned, 0);
        assert_eq!(summary.elapsed, Duration::from_secs(60));
        assert!(recorder.seen.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_dispatches_early() {
        let queue = Arc::new(EligibilityQueue::new());
        let t = Instant::now();
        let offsets = [0u64, 1, 5];
        for (seq, secs) in offsets.iter().enumerate() {
            queue
                .insert(QueueEntry::new(t + Duration::from_secs(*secs), item(seq as u64)))
                .await;
        }

        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(config(2), Arc::clone(&queue), Arc::clone(&recorder));
        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.resumed, 0);
        let seen = recorder.seen.lock().await;
        assert_eq!(seen.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![0, 1, 2]);
        for (seq, at) in seen.iter() {
            let due = t + Duration::from_secs(offsets[*seq as usize]);
            assert!(*at >= due, "item {} dispatched before it was eligible", seq);
            assert!(*at - due <= Duration::from_millis(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_eligibility_dispatches_in_sequence_order() {
        let queue = Arc::new(EligibilityQueue::new());
        let t = Instant::now() + Duration::from_secs(1);
        queue.insert(QueueEntry::new(t, item(2))).await;
        queue.insert(QueueEntry::new(t, item(1))).await;

        let recorder = Arc::new(Recorder::default());
        let config = SchedulerConfig {
            max_workers: 1,
            queue_timeout_secs: 1,
            ..Default::default()
        };
        Dispatcher::new(config, queue, Arc::clone(&recorder)).run().await.unwrap();

        let order: Vec<u64> = recorder.seen.lock().await.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, vec![1, 2]);
    }

    /// Re-stages every item once, after a delay
    struct RetryOnce {
        queue: Arc<EligibilityQueue>,
        delay: Duration,
        seen: Mutex<Vec<(u64, u32, Instant)>>,
    }

    #[async_trait]
    impl ItemHandler for RetryOnce {
        async fn handle(&self, item: WorkItem) {
            let now = Instant::now();
            self.seen.lock().await.push((item.sequence, item.attempt, now));
            if item.attempt == 0 {
                self.queue.insert(QueueEntry::new(now + self.delay, item.retried())).await;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinserted_items_keep_the_loop_alive() {
        let queue = Arc::new(EligibilityQueue::new());
        queue.insert(QueueEntry::new(Instant::now(), item(0))).await;

        let handler = Arc::new(RetryOnce {
            queue: Arc::clone(&queue),
            delay: Duration::from_secs(30),
            seen: Mutex::new(Vec::new()),
        });

        // Timeout is longer than the retry delay, so the retry wakes the wait
        let dispatcher = Dispatcher::new(config(60), Arc::clone(&queue), Arc::clone(&handler));
        let summary = dispatcher.run().await.unwrap();

        let seen = handler.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1, 1);
        assert!(seen[1].2 - seen[0].2 >= Duration::from_secs(30));
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.redispatched, 1);
        assert_eq!(summary.resumed, 1);
        // 30s retry delay, then a full 60s of silence
        assert_eq!(summary.elapsed, Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_retry_entries_are_reported_abandoned() {
        /// Handler that takes longer than the queue timeout before re-staging
        struct Slow(Arc<EligibilityQueue>);

        #[async_trait]
        impl ItemHandler for Slow {
            async fn handle(&self, item: WorkItem) {
                tokio::time::sleep(Duration::from_secs(10)).await;
                if item.attempt == 0 {
                    self.0.insert(QueueEntry::new(Instant::now(), item.retried())).await;
                }
            }
        }

        let queue = Arc::new(EligibilityQueue::new());
        queue.insert(QueueEntry::new(Instant::now(), item(0))).await;

        let dispatcher = Dispatcher::new(config(2), Arc::clone(&queue), Arc::new(Slow(Arc::clone(&queue))));
        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.pool.completed, 1);
    }
}
