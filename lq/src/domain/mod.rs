//! Domain types for lookup candidates and work items

pub mod dedupe;
mod item;

pub use dedupe::{exclude_seen, unique_by, unique_candidates};
pub use item::{Candidate, DT_FORMAT, RawRecord, WorkItem};
