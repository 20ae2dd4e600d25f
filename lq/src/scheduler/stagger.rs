//! Initial staging: spread candidates over time to stay under the API rate ceiling

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::{Candidate, WorkItem};

use super::config::RateLimitConfig;
use super::queue::{EligibilityQueue, QueueEntry};

/// A work item and its eligibility offset from the start of staging
#[derive(Debug, Clone)]
pub struct StagedItem {
    pub offset: Duration,
    pub item: WorkItem,
}

/// Assign sequences and staggered offsets, in input order
pub fn plan(candidates: Vec<Candidate>, rate: &RateLimitConfig) -> Vec<StagedItem> {
    debug!(count = candidates.len(), interval = ?rate.interval(), "plan: called");
    let interval = rate.interval();
    let start = rate.start_delay();

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| StagedItem {
            offset: start + interval * i as u32,
            item: WorkItem::new(i as u64, candidate),
        })
        .collect()
}

/// Insert every planned item into the queue, relative to `start`
pub async fn stage(queue: &EligibilityQueue, plan: Vec<StagedItem>, start: Instant) -> usize {
    debug!(count = plan.len(), "stage: called");
    let count = plan.len();
    for staged in plan {
        info!(
            email = %staged.item.lookup_value,
            id = %staged.item.identity,
            "Queue | add {} to the queue",
            staged.item.lookup_value
        );
        queue.insert(QueueEntry::new(start + staged.offset, staged.item)).await;
    }
    count
}
