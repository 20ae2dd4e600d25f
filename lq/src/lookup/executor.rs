//! Lookup executor: one API call per released item, with retry-later re-staging

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{LookupKind, LookupTransport, Outcome, describe_status};
use crate::artifact::{ArtifactKey, ArtifactSink};
use crate::domain::WorkItem;
use crate::scheduler::{EligibilityQueue, ItemHandler, QueueEntry, SchedulerConfig};

/// Outcome counters across all lookups of a run
#[derive(Debug, Default)]
pub struct ExecutorStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// Point-in-time copy of [`ExecutorStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorTotals {
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
}

impl ExecutorStats {
    pub fn totals(&self) -> ExecutorTotals {
        ExecutorTotals {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            retried: self.retried.load(Ordering::SeqCst),
        }
    }
}

/// Performs lookups, writes every response, and re-stages retry-later items
pub struct LookupExecutor {
    transport: Arc<dyn LookupTransport>,
    sink: Arc<dyn ArtifactSink>,
    queue: Arc<EligibilityQueue>,
    kind: LookupKind,
    retry_delay: Duration,
    max_retries: Option<u32>,
    stats: ExecutorStats,
}

impl LookupExecutor {
    pub fn new(
        transport: Arc<dyn LookupTransport>,
        sink: Arc<dyn ArtifactSink>,
        queue: Arc<EligibilityQueue>,
        config: &SchedulerConfig,
    ) -> Self {
        debug!(retry_delay = ?config.retry_delay(), max_retries = ?config.max_retries, "LookupExecutor::new: called");
        Self {
            transport,
            sink,
            queue,
            kind: LookupKind::Email,
            retry_delay: config.retry_delay(),
            max_retries: config.max_retries,
            stats: ExecutorStats::default(),
        }
    }

    pub fn totals(&self) -> ExecutorTotals {
        self.stats.totals()
    }

    /// Run one lookup attempt for `item`; never fails outward
    pub async fn process(&self, item: WorkItem) {
        let email = item.lookup_value.as_str();
        let id = item.identity.as_str();
        info!(%email, %id, attempt = item.attempt, "Post | {} posted to the person API", email);

        let (outcome, payload) = match self.transport.lookup(self.kind, email).await {
            Ok(response) => {
                let rl = &response.rate_limit;
                if rl.is_empty() {
                    info!(%email, %id, status = response.status, "Return | return status code: {}", response.status);
                } else {
                    info!(
                        %email,
                        %id,
                        status = response.status,
                        date = rl.date.as_deref().unwrap_or("-"),
                        rate_limit = rl.limit.as_deref().unwrap_or("-"),
                        rate_limit_remaining = rl.remaining.as_deref().unwrap_or("-"),
                        rate_limit_reset = rl.reset.as_deref().unwrap_or("-"),
                        "Return | return status code: {}",
                        response.status
                    );
                }
                let outcome = response.outcome();
                info!(%email, %id, status = response.status, "Results | status {} | {}", response.status, describe_status(response.status));
                (outcome, response.body)
            }
            Err(e) => {
                warn!(%email, %id, error = %e, "Results | lookup failed");
                (Outcome::Failure, e.to_payload())
            }
        };

        let key = ArtifactKey::for_item(&item);
        if let Err(e) = self.sink.write(&key, &payload).await {
            error!(%email, %id, error = %e, "Failed to write artifact");
        } else {
            debug!(file = %key.file_name(), "LookupExecutor::process: artifact written");
        }

        match outcome {
            Outcome::Success => {
                self.stats.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            Outcome::Failure => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
            }
            Outcome::RetryLater => self.restage(item).await,
        }
    }

    async fn restage(&self, item: WorkItem) {
        if let Some(max) = self.max_retries
            && item.attempt >= max
        {
            warn!(
                email = %item.lookup_value,
                id = %item.identity,
                attempts = item.attempt + 1,
                "Retry limit reached, giving up on item"
            );
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            return;
        }

        info!(
            email = %item.lookup_value,
            id = %item.identity,
            retry_secs = self.retry_delay.as_secs(),
            "Results | request is being processed | adding back to the queue"
        );
        self.stats.retried.fetch_add(1, Ordering::SeqCst);
        let eligible_at = Instant::now() + self.retry_delay;
        self.queue.insert(QueueEntry::new(eligible_at, item.retried())).await;
    }
}

#[async_trait]
impl ItemHandler for LookupExecutor {
    async fn handle(&self, item: WorkItem) {
        self.process(item).await;
    }
}

/// Logs each released item without calling the API or writing artifacts
#[derive(Debug, Default)]
pub struct DryRunHandler {
    released: AtomicU64,
}

impl DryRunHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemHandler for DryRunHandler {
    async fn handle(&self, item: WorkItem) {
        self.released.fetch_add(1, Ordering::SeqCst);
        info!(email = %item.lookup_value, id = %item.identity, "Print | print {}", item.lookup_value);
    }
}
