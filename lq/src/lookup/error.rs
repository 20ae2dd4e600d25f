//! Lookup error types

use thiserror::Error;

/// Errors talking to the lookup API
///
/// Any of these ends the attempt as a terminal failure; the scheduler never
/// retries them on its own.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API key not found: set {env} or create {file}")]
    MissingApiKey { env: String, file: String },

    #[error("Failed to read API key file {path}: {source}")]
    ApiKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),
}

impl LookupError {
    /// Payload written to the artifact sink in place of an API response
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}
