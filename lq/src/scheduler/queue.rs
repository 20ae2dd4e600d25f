//! Eligibility queue: a time-ordered priority heap shared by the dispatcher and workers

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::WorkItem;

/// A work item waiting for its eligibility time
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub eligible_at: Instant,
    pub item: WorkItem,
}

impl QueueEntry {
    pub fn new(eligible_at: Instant, item: WorkItem) -> Self {
        Self { eligible_at, item }
    }

    /// Time left until the entry may be dispatched, zero once eligible
    pub fn remaining(&self, now: Instant) -> Duration {
        self.eligible_at.saturating_duration_since(now)
    }

    pub fn is_eligible(&self, now: Instant) -> bool {
        self.eligible_at <= now
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest eligibility first, then lowest sequence
        self.eligible_at
            .cmp(&other.eligible_at)
            .then_with(|| self.item.sequence.cmp(&other.item.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of a blocking extraction
#[derive(Debug)]
pub enum Extracted {
    Entry(QueueEntry),
    /// The queue stayed empty for the whole timeout
    TimedOut,
}

/// Thread-safe min-heap of queue entries
///
/// Inserts wake any extraction that is currently blocked on an empty queue.
pub struct EligibilityQueue {
    heap: Mutex<BinaryHeap<Reverse<QueueEntry>>>,
    notify: Notify,
}

impl Default for EligibilityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EligibilityQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
        }
    }

    /// Add an entry and wake a blocked extractor
    pub async fn insert(&self, entry: QueueEntry) {
        debug!(id = %entry.item.identity, sequence = entry.item.sequence, "EligibilityQueue::insert: called");
        self.heap.lock().await.push(Reverse(entry));
        self.notify.notify_waiters();
    }

    /// Remove the minimum entry, waiting up to `timeout` for one to appear
    pub async fn extract_earliest(&self, timeout: Duration) -> Extracted {
        debug!(?timeout, "EligibilityQueue::extract_earliest: called");
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so an insert between the
            // check and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(Reverse(entry)) = self.heap.lock().await.pop() {
                return Extracted::Entry(entry);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!("EligibilityQueue::extract_earliest: timed out on empty queue");
                return Extracted::TimedOut;
            }
        }
    }

    /// Offer a held entry back and take whichever entry is now the minimum
    ///
    /// Returns `entry` itself unless something strictly earlier was inserted
    /// while it was held.
    pub async fn requeue_and_extract(&self, entry: QueueEntry) -> QueueEntry {
        let mut heap = self.heap.lock().await;
        if let Some(mut top) = heap.peek_mut()
            && top.0 < entry
        {
            debug!(
                held = entry.item.sequence,
                earlier = top.0.item.sequence,
                "EligibilityQueue::requeue_and_extract: swapping for earlier entry"
            );
            return std::mem::replace(&mut top.0, entry);
        }
        entry
    }

    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candidate;
    use chrono::NaiveDateTime;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn item(sequence: u64) -> WorkItem {
        let dt = NaiveDateTime::parse_from_str("2016-06-03 19:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        WorkItem::new(
            sequence,
            Candidate::new(format!("id-{}", sequence), dt, format!("user{}@example.com", sequence)),
        )
    }

    fn take(extracted: Extracted) -> QueueEntry {
        match extracted {
            Extracted::Entry(entry) => entry,
            Extracted::TimedOut => panic!("expected an entry"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_extracts_earliest_not_first_inserted() {
        let queue = EligibilityQueue::new();
        let t = Instant::now();

        queue.insert(QueueEntry::new(t + Duration::from_secs(5), item(0))).await;
        queue.insert(QueueEntry::new(t + Duration::from_secs(1), item(1))).await;
        queue.insert(QueueEntry::new(t, item(2))).await;

        let wait = Duration::from_secs(1);
        assert_eq!(take(queue.extract_earliest(wait).await).item.sequence, 2);
        assert_eq!(take(queue.extract_earliest(wait).await).item.sequence, 1);
        assert_eq!(take(queue.extract_earliest(wait).await).item.sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_break_on_sequence_regardless_of_insert_order() {
        let queue = EligibilityQueue::new();
        let t = Instant::now();

        queue.insert(QueueEntry::new(t, item(2))).await;
        queue.insert(QueueEntry::new(t, item(1))).await;

        let wait = Duration::from_secs(1);
        assert_eq!(take(queue.extract_earliest(wait).await).item.sequence, 1);
        assert_eq!(take(queue.extract_earliest(wait).await).item.sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_past_entries_are_eligible() {
        let queue = EligibilityQueue::new();
        let t = Instant::now();

        queue.insert(QueueEntry::new(t, item(0))).await;
        queue.insert(QueueEntry::new(t + Duration::from_secs(1), item(1))).await;
        queue.insert(QueueEntry::new(t + Duration::from_secs(5), item(2))).await;

        tokio::time::advance(Duration::from_millis(500)).await;
        let now = Instant::now();

        let first = take(queue.extract_earliest(Duration::ZERO).await);
        assert_eq!(first.item.sequence, 0);
        assert!(first.is_eligible(now));

        let second = take(queue.extract_earliest(Duration::ZERO).await);
        assert!(!second.is_eligible(now));
        assert_eq!(second.remaining(now), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_on_empty_queue() {
        let queue = EligibilityQueue::new();
        let started = Instant::now();

        assert!(matches!(
            queue.extract_earliest(Duration::from_secs(60)).await,
            Extracted::TimedOut
        ));
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_interrupts_blocked_extract() {
        let queue = Arc::new(EligibilityQueue::new());

        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            producer.insert(QueueEntry::new(Instant::now(), item(7))).await;
        });

        let started = Instant::now();
        let entry = take(queue.extract_earliest(Duration::from_secs(60)).await);
        assert_eq!(entry.item.sequence, 7);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_swaps_for_earlier_entry() {
        let queue = EligibilityQueue::new();
        let t = Instant::now();

        let held = QueueEntry::new(t + Duration::from_secs(30), item(0));
        queue.insert(QueueEntry::new(t + Duration::from_secs(2), item(1))).await;

        let next = queue.requeue_and_extract(held).await;
        assert_eq!(next.item.sequence, 1);
        assert_eq!(queue.len().await, 1);

        // Held entry is now the only one left and comes straight back
        let again = queue.requeue_and_extract(next).await;
        assert_eq!(again.item.sequence, 1);
        assert_eq!(take(queue.extract_earliest(Duration::ZERO).await).item.sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_keeps_held_entry_on_empty_queue() {
        let queue = EligibilityQueue::new();
        let held = QueueEntry::new(Instant::now() + Duration::from_secs(3), item(4));

        let next = queue.requeue_and_extract(held).await;
        assert_eq!(next.item.sequence, 4);
        assert!(queue.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_feed_a_blocked_consumer() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 25;

        let queue = Arc::new(EligibilityQueue::new());
        let base = Instant::now();

        // Consumer is usually already waiting on the empty queue when inserts begin
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Extracted::Entry(entry) = queue.extract_earliest(Duration::from_millis(500)).await {
                    seen.push(entry.item.sequence);
                }
                seen
            })
        };

        let mut producers = tokio::task::JoinSet::new();
        for p in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            producers.spawn(async move {
                for i in 0..PER_PRODUCER {
                    let seq = p * PER_PRODUCER + i;
                    queue.insert(QueueEntry::new(base + Duration::from_secs(seq % 7), item(seq))).await;
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = producers.join_next().await {
            result.unwrap();
        }

        let mut seen = consumer.await.unwrap();
        assert_eq!(seen.len() as u64, PRODUCERS * PER_PRODUCER);
        assert!(queue.is_empty().await);

        // Nothing lost or duplicated
        seen.sort();
        assert_eq!(seen, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_drain_in_total_order() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 25;

        let queue = Arc::new(EligibilityQueue::new());
        let base = Instant::now();

        let mut producers = tokio::task::JoinSet::new();
        for p in 0..PRODUCERS {
            let queue = Arc::clone(&queue);
            producers.spawn(async move {
                for i in 0..PER_PRODUCER {
                    let seq = p * PER_PRODUCER + i;
                    queue.insert(QueueEntry::new(base + Duration::from_secs(seq % 7), item(seq))).await;
                }
            });
        }
        while let Some(result) = producers.join_next().await {
            result.unwrap();
        }

        let mut extracted = Vec::new();
        while let Extracted::Entry(entry) = queue.extract_earliest(Duration::ZERO).await {
            extracted.push((entry.eligible_at, entry.item.sequence));
        }

        let mut expected = extracted.clone();
        expected.sort();
        assert_eq!(extracted.len() as u64, PRODUCERS * PER_PRODUCER);
        assert_eq!(extracted, expected);
    }

    proptest! {
        #[test]
        fn prop_extraction_follows_total_order(offsets in proptest::collection::vec(0u64..5, 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            rt.block_on(async {
                let queue = EligibilityQueue::new();
                let t = Instant::now();
                for (seq, offset) in offsets.iter().enumerate() {
                    queue.insert(QueueEntry::new(t + Duration::from_secs(*offset), item(seq as u64))).await;
                }

                let mut extracted = Vec::new();
                while let Extracted::Entry(entry) = queue.extract_earliest(Duration::ZERO).await {
                    extracted.push((entry.eligible_at, entry.item.sequence));
                }

                let mut expected = extracted.clone();
                expected.sort();
                prop_assert_eq!(extracted.len(), offsets.len());
                prop_assert_eq!(extracted, expected);
                Ok(())
            })?;
        }
    }
}
