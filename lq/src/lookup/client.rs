//! LookupTransport trait definition

use async_trait::async_trait;

use super::{LookupError, LookupKind, LookupResponse};

/// One call to the external lookup API
///
/// Any HTTP status comes back as `Ok`; `Err` is reserved for failures to get
/// a response at all.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    async fn lookup(&self, kind: LookupKind, value: &str) -> Result<LookupResponse, LookupError>;
}
