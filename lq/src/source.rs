//! Work-item source and processed-history files (newline-delimited JSON)

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Candidate, RawRecord};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Candidates read from a source file, plus how many lines were rejected
#[derive(Debug, Default)]
pub struct LoadReport {
    pub candidates: Vec<Candidate>,
    pub rejected: usize,
}

/// Parse NDJSON records, logging and skipping malformed lines
pub fn parse_candidates(content: &str, origin: &str) -> LoadReport {
    let mut report = LoadReport::default();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<RawRecord>(line)
            .map_err(|e| e.to_string())
            .and_then(Candidate::try_from);
        match parsed {
            Ok(candidate) => report.candidates.push(candidate),
            Err(reason) => {
                warn!(source = %origin, line = idx + 1, %reason, "Rejecting malformed work item");
                report.rejected += 1;
            }
        }
    }
    report
}

/// Read candidates from an NDJSON file
pub fn read_candidates(path: &Path) -> Result<LoadReport, SourceError> {
    debug!(path = %path.display(), "read_candidates: called");
    let content = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_candidates(&content, &path.display().to_string()))
}

/// Read previously processed items; a missing file means nothing was processed yet
pub fn read_history(path: &Path) -> Result<Vec<Candidate>, SourceError> {
    debug!(path = %path.display(), "read_history: called");
    if !path.exists() {
        debug!("read_history: no history file yet");
        return Ok(Vec::new());
    }
    Ok(read_candidates(path)?.candidates)
}

/// Append items to the history file, creating it if needed
pub fn append_history(path: &Path, items: &[Candidate]) -> Result<(), SourceError> {
    debug!(path = %path.display(), count = items.len(), "append_history: called");
    let write_err = |source: std::io::Error| SourceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(out.as_bytes()).map_err(write_err)
}

/// Round a timestamp down to the start of its hour
pub fn hour_floor(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date()
        .and_hms_opt(dt.hour(), 0, 0)
        .unwrap_or(dt)
}
