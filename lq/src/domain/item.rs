//! Lookup candidates and the work items built from them

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the upstream extract and the history file
pub const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One `(identity, created_at, lookup_value)` tuple from the work-item source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "id")]
    pub identity: String,

    #[serde(rename = "dt", with = "dt_format")]
    pub created_at: NaiveDateTime,

    #[serde(rename = "email")]
    pub lookup_value: String,
}

impl Candidate {
    pub fn new(identity: impl Into<String>, created_at: NaiveDateTime, lookup_value: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            created_at,
            lookup_value: lookup_value.into(),
        }
    }

    /// Identity/lookup pairing that selects one output artifact
    pub fn key(&self) -> (String, String) {
        (self.identity.clone(), self.lookup_value.clone())
    }
}

/// Record as it appears on the wire, before validation
///
/// Every field is optional so a bad line can be reported instead of
/// failing the whole file.
#[derive(Debug, Deserialize)]
pub struct RawRecord {
    pub id: Option<serde_json::Value>,
    pub dt: Option<String>,
    pub email: Option<String>,
}

impl TryFrom<RawRecord> for Candidate {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let identity = match raw.id {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) => {
                return Err("missing id".to_string());
            }
            Some(other) => return Err(format!("unsupported id value: {}", other)),
        };

        let lookup_value = match raw.email {
            Some(e) if !e.trim().is_empty() => e.trim().to_string(),
            _ => return Err("missing email".to_string()),
        };

        let dt = raw.dt.ok_or_else(|| "missing dt".to_string())?;
        let created_at = NaiveDateTime::parse_from_str(dt.trim(), DT_FORMAT)
            .map_err(|e| format!("invalid dt '{}': {}", dt, e))?;

        Ok(Self {
            identity,
            created_at,
            lookup_value,
        })
    }
}

/// An email lookup task travelling through the eligibility queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Tie-breaker between entries with identical eligibility time
    pub sequence: u64,
    pub identity: String,
    pub created_at: NaiveDateTime,
    pub lookup_value: String,
    /// Number of times this item has been re-staged after a retry-later response
    pub attempt: u32,
}

impl WorkItem {
    pub fn new(sequence: u64, candidate: Candidate) -> Self {
        Self {
            sequence,
            identity: candidate.identity,
            created_at: candidate.created_at,
            lookup_value: candidate.lookup_value,
            attempt: 0,
        }
    }

    /// The same item, re-staged for another attempt
    pub fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }

    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date()
    }
}

mod dt_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DT_FORMAT;

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.format(DT_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DT_FORMAT).map_err(serde::de::Error::custom)
    }
}
