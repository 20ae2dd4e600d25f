//! Person API client
//!
//! POSTs one lookup per call with the API key in a header and the lookup
//! value as a query parameter.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tracing::debug;

use super::{LookupError, LookupKind, LookupResponse, LookupTransport, RateLimitHeaders};
use crate::config::LookupConfig;

const API_KEY_HEADER: &str = "X-FullContact-APIKey";

/// HTTP client for the person lookup endpoint
pub struct PersonApiClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl PersonApiClient {
    /// Create a client, resolving the API key from the environment or key file
    pub fn from_config(config: &LookupConfig) -> Result<Self, LookupError> {
        debug!(base_url = %config.base_url, "PersonApiClient::from_config: called");
        let api_key = config.get_api_key()?;
        Self::new(&config.base_url, api_key, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self, LookupError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.to_string(),
            api_key,
            http,
        })
    }

    fn rate_limit_headers(headers: &HeaderMap) -> RateLimitHeaders {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        RateLimitHeaders {
            date: get("Date"),
            limit: get("X-Rate-Limit-Limit"),
            remaining: get("X-Rate-Limit-Remaining"),
            reset: get("X-Rate-Limit-Reset"),
        }
    }
}

#[async_trait]
impl LookupTransport for PersonApiClient {
    async fn lookup(&self, kind: LookupKind, value: &str) -> Result<LookupResponse, LookupError> {
        debug!(%kind, %value, "PersonApiClient::lookup: called");
        let (param, value) = kind.query_param(value)?;

        let response = self
            .http
            .post(&self.base_url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("prettyPrint", "true"), (param, value.as_str())])
            .send()
            .await?;

        let status = response.status().as_u16();
        let rate_limit = Self::rate_limit_headers(response.headers());
        let text = response.text().await?;
        debug!(status, body_len = text.len(), "PersonApiClient::lookup: response received");

        Ok(LookupResponse {
            status,
            body: LookupResponse::parse_body(&text),
            rate_limit,
        })
    }
}
