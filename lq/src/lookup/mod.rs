//! Lookup transport and executor
//!
//! The transport performs a single API call; the executor interprets the
//! response, persists it, and decides whether the item goes back in the queue.

pub mod client;
mod error;
mod executor;
mod person;
mod types;

pub use client::LookupTransport;
pub use error::LookupError;
pub use executor::{DryRunHandler, ExecutorTotals, LookupExecutor};
pub use person::PersonApiClient;
pub use types::{LookupKind, LookupResponse, Outcome, RateLimitHeaders, describe_status};
