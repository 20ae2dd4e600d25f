//! Lookupq - rate-limited email lookups
//!
//! Lookupq takes a batch of email addresses, submits each one to the person
//! lookup API without exceeding its request-rate ceiling, and stores every
//! response as a JSON artifact.
//!
//! # Core Concepts
//!
//! - **Eligibility Time**: every item is staged with the earliest instant it may run
//! - **Bounded Concurrency**: a fixed worker pool caps outstanding API calls
//! - **Retry-Later**: "still processing" responses put the item back in the queue
//! - **Quiescence**: the run ends once nothing has been queued for a full timeout
//!
//! # Modules
//!
//! - [`scheduler`] - Eligibility queue, worker pool and dispatch loop
//! - [`lookup`] - Lookup transport, person API client and executor
//! - [`artifact`] - Response persistence
//! - [`source`] - Work-item input and processed history
//! - [`domain`] - Candidates, work items and deduplication
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod artifact;
pub mod cli;
pub mod config;
pub mod domain;
pub mod lookup;
pub mod run;
pub mod scheduler;
pub mod source;

// Re-export commonly used types
pub use artifact::{ArtifactKey, ArtifactSink, JsonFileSink, MemorySink, SinkError};
pub use config::{Config, LookupConfig, OutputConfig};
pub use domain::{Candidate, WorkItem, exclude_seen, unique_by, unique_candidates};
pub use lookup::{
    DryRunHandler, ExecutorTotals, LookupError, LookupExecutor, LookupKind, LookupResponse, LookupTransport, Outcome,
    PersonApiClient,
};
pub use run::{Prepared, RunOptions, RunReport, execute, execute_with, prepare, schedule};
pub use scheduler::{
    DispatchState, DispatchSummary, Dispatcher, EligibilityQueue, Extracted, ItemHandler, PoolError, PoolStats,
    QueueEntry, RateLimitConfig, SchedulerConfig, WorkerPool,
};
pub use source::{LoadReport, SourceError};
