//! Fixed-capacity worker pool

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

/// Errors raised by the worker pool itself (never by the tasks it runs)
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("Worker pool is closed")]
    Closed,
}

/// Counters reported when the pool shuts down
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
}

/// Runs submitted tasks with at most `capacity` in flight
///
/// `submit` waits for a free slot, so a full pool applies backpressure to the
/// caller. A task that panics is logged and counted; the pool keeps going.
pub struct WorkerPool {
    capacity: usize,
    slots: Arc<Semaphore>,
    tasks: JoinSet<()>,
    closed: bool,
    stats: PoolStats,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        debug!(capacity, "WorkerPool::new: called");
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            closed: false,
            stats: PoolStats::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Hand a task to the pool, waiting for a free slot if all are busy
    pub async fn submit<F>(&mut self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed {
            return Err(PoolError::Closed);
        }

        // Keep the join set from growing with finished tasks
        while let Some(result) = self.tasks.try_join_next() {
            self.record(result);
        }

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        self.tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
        self.stats.submitted += 1;
        Ok(())
    }

    /// Stop accepting work and wait for every submitted task to finish
    pub async fn shutdown_and_wait(&mut self) -> PoolStats {
        debug!(in_flight = self.in_flight(), "WorkerPool::shutdown_and_wait: called");
        self.closed = true;
        while let Some(result) = self.tasks.join_next().await {
            self.record(result);
        }
        self.slots.close();
        debug!(stats = ?self.stats, "WorkerPool::shutdown_and_wait: drained");
        self.stats.clone()
    }

    fn record(&mut self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => self.stats.completed += 1,
            Err(e) if e.is_panic() => {
                error!(error = %e, "Worker task panicked");
                self.stats.panicked += 1;
            }
            Err(e) => {
                error!(error = %e, "Worker task was cancelled");
                self.stats.panicked += 1;
            }
        }
    }
}
