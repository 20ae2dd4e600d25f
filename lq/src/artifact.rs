//! Artifact sink: persists one JSON response per work item

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::WorkItem;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Location of an item's artifact: creation date plus the identity/lookup pairing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub date: NaiveDate,
    pub identity: String,
    pub lookup_value: String,
}

impl ArtifactKey {
    pub fn for_item(item: &WorkItem) -> Self {
        Self {
            date: item.created_date(),
            identity: item.identity.clone(),
            lookup_value: item.lookup_value.clone(),
        }
    }

    /// `<YYYY-MM-DD>_<identity>_<lookup value>.json`, with path separators replaced
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.json",
            self.date.format("%Y-%m-%d"),
            sanitize(&self.identity),
            sanitize(&self.lookup_value)
        )
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

/// Destination for raw lookup responses; repeated writes for a key overwrite
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn write(&self, key: &ArtifactKey, payload: &serde_json::Value) -> Result<(), SinkError>;
}

/// Writes each artifact as a pretty-printed JSON file in one directory
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Open the sink, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        debug!(dir = %dir.display(), "JsonFileSink::open: called");
        std::fs::create_dir_all(&dir).map_err(|source| SinkError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

#[async_trait]
impl ArtifactSink for JsonFileSink {
    async fn write(&self, key: &ArtifactKey, payload: &serde_json::Value) -> Result<(), SinkError> {
        let path = self.path_for(key);
        debug!(path = %path.display(), "JsonFileSink::write: called");
        let mut bytes = serde_json::to_vec_pretty(payload)?;
        bytes.push(b'\n');
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| SinkError::Write { path, source })
    }
}

/// Keeps the latest payload per key in memory
#[derive(Default)]
pub struct MemorySink {
    artifacts: Mutex<HashMap<ArtifactKey, serde_json::Value>>,
    writes: Mutex<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &ArtifactKey) -> Option<serde_json::Value> {
        self.artifacts.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.lock().await.is_empty()
    }

    /// Total writes, counting overwrites
    pub async fn writes(&self) -> u64 {
        *self.writes.lock().await
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, key: &ArtifactKey, payload: &serde_json::Value) -> Result<(), SinkError> {
        self.artifacts.lock().await.insert(key.clone(), payload.clone());
        *self.writes.lock().await += 1;
        Ok(())
    }
}
