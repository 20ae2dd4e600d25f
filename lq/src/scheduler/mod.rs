//! Rate-limited dispatch scheduler
//!
//! Items wait in an eligibility queue ordered by the time they may run, are
//! released onto a bounded worker pool once that time passes, and can be put
//! back by the handler when the downstream API asks for a later retry. The
//! loop ends once the queue has stayed empty for the configured timeout.

mod config;
mod dispatch;
mod pool;
mod queue;
mod stagger;

pub use config::{RateLimitConfig, SchedulerConfig};
pub use dispatch::{DispatchState, DispatchSummary, Dispatcher, ItemHandler, backoff};
pub use pool::{PoolError, PoolStats, WorkerPool};
pub use queue::{EligibilityQueue, Extracted, QueueEntry};
pub use stagger::{StagedItem, plan, stage};
