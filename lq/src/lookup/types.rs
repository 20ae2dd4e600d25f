//! Lookup request and response types

use serde::{Deserialize, Serialize};

use super::LookupError;

/// What the lookup value identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    #[default]
    Email,
    Phone,
    Twitter,
}

impl LookupKind {
    /// Query parameter name and normalized value for this kind of lookup
    pub fn query_param(&self, value: &str) -> Result<(&'static str, String), LookupError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(LookupError::InvalidLookup(format!("empty {} value", self)));
        }
        Ok(match self {
            Self::Email => ("email", value.to_string()),
            Self::Phone => {
                let digits: String = value.chars().filter(|c| !matches!(c, '(' | ')' | '-')).collect();
                ("phone", format!("+1{}", digits))
            }
            Self::Twitter => ("twitter", value.to_string()),
        })
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
            Self::Twitter => write!(f, "twitter"),
        }
    }
}

impl std::str::FromStr for LookupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            "twitter" => Ok(Self::Twitter),
            _ => Err(format!("lookup should be one of email, phone, or twitter (got {})", s)),
        }
    }
}

/// How a response affects scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Definitive negative or error result; not retried
    Failure,
    /// The API is still computing the result
    RetryLater,
}

impl Outcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Self::Success,
            202 => Self::RetryLater,
            _ => Self::Failure,
        }
    }
}

/// Human-readable meaning of a person API status code
pub fn describe_status(status: u16) -> &'static str {
    match status {
        200 => "success",
        202 => "request is being processed",
        400 => "bad / malformed request",
        403 => "forbidden | api key is invalid, missing, or exceeded quota",
        404 => "not found | person searched in the past 24 hours and nothing was found",
        405 => "method not allowed | queried the API with an unsupported HTTP method",
        410 => "gone | the resource cannot be found",
        422 => "invalid | invalid or missing API query parameter",
        500 => "internal server error",
        503 => "service temporarily down | check the Retry-After header",
        _ => "unexpected status",
    }
}

/// Rate-limit headers reported by the API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub date: Option<String>,
    pub limit: Option<String>,
    pub remaining: Option<String>,
    pub reset: Option<String>,
}

impl RateLimitHeaders {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.limit.is_none() && self.remaining.is_none() && self.reset.is_none()
    }
}

/// Raw response from one lookup call
#[derive(Debug, Clone)]
pub struct LookupResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub rate_limit: RateLimitHeaders,
}

impl LookupResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body,
            rate_limit: RateLimitHeaders::default(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_status(self.status)
    }

    /// Parse a body as JSON, keeping non-JSON text under a `raw` key
    pub fn parse_body(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
    }
}
