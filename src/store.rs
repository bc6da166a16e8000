//! Persistence for finished test runs.
//!
//! The store is an explicit handle passed to whoever needs it (the runner and
//! the HTTP handlers); there is no process-global connection.

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::{TestConfig, TestSummary};

/// Errors that can occur while saving or loading results.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Result store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize test record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A finished test run as persisted and served by `GET /result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: String,
    /// Shared by every run submitted in the same batch request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_request_id: Option<String>,
    #[serde(flatten)]
    pub config: TestConfig,
    pub test_summary: TestSummary,
    /// Unix seconds.
    pub created_at: u64,
}

/// Storage backend for test records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Saves a record, replacing any record with the same id.
    async fn save(&self, record: &TestRecord) -> Result<(), StoreError>;

    /// Looks up a record by its own id.
    async fn find(&self, id: &str) -> Result<Option<TestRecord>, StoreError>;

    /// Returns every record of a batch, oldest first.
    async fn find_by_request(&self, test_request_id: &str)
        -> Result<Vec<TestRecord>, StoreError>;
}

/// Records kept by [`MemoryStore::new`].
pub const DEFAULT_MEMORY_CAPACITY: usize = 1000;

/// Keeps the most recently saved records in process memory.
///
/// Once `capacity` records are held, saving a new one evicts the least
/// recently saved. Contents are lost on restart.
pub struct MemoryStore {
    records: RwLock<LruCache<String, TestRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    /// A store holding at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            records: RwLock::new(LruCache::new(capacity)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn save(&self, record: &TestRecord) -> Result<(), StoreError> {
        let evicted = self
            .records
            .write()
            .await
            .push(record.id.clone(), record.clone());

        if let Some((id, _)) = evicted.filter(|(id, _)| *id != record.id) {
            debug!(test_id = %id, "Evicted oldest test result from memory store");
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<TestRecord>, StoreError> {
        Ok(self.records.read().await.peek(id).cloned())
    }

    async fn find_by_request(
        &self,
        test_request_id: &str,
    ) -> Result<Vec<TestRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<TestRecord> = records
            .iter()
            .map(|(_, record)| record)
            .filter(|r| r.test_request_id.as_deref() == Some(test_request_id))
            .cloned()
            .collect();
        sort_records(&mut matching);
        Ok(matching)
    }
}

/// Stores each record as `<id>.json` inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Uses `dir`, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file result store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl ResultStore for FileStore {
    async fn save(&self, record: &TestRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;

        // Write then rename so readers never observe a half-written file.
        let tmp_path = self.dir.join(format!(".{}.json.tmp", record.id));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, self.record_path(&record.id)).await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<TestRecord>, StoreError> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_request(
        &self,
        test_request_id: &str,
    ) -> Result<Vec<TestRecord>, StoreError> {
        let mut matching = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<TestRecord>(&bytes) {
                Ok(record) if record.test_request_id.as_deref() == Some(test_request_id) => {
                    matching.push(record)
                }
                Ok(_) => {}
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable result file"
                ),
            }
        }

        sort_records(&mut matching);
        Ok(matching)
    }
}

fn sort_records(records: &mut [TestRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::summarize;
    use std::collections::HashMap;
    use std::time::Duration;

    fn record(id: &str, request_id: Option<&str>, created_at: u64) -> TestRecord {
        TestRecord {
            id: id.to_string(),
            test_request_id: request_id.map(str::to_string),
            config: TestConfig {
                endpoint: "http://localhost/".to_string(),
                method: "GET".to_string(),
                body: String::new(),
                concurrency: 1,
                requests: 0,
                headers: HashMap::new(),
            },
            test_summary: summarize(Vec::new(), 0, Duration::ZERO),
            created_at,
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let rec = record("a", None, 1);

        store.save(&rec).await.unwrap();

        assert_eq!(store.find("a").await.unwrap(), Some(rec));
        assert_eq!(store.find("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_groups_batches() {
        let store = MemoryStore::new();
        store.save(&record("b", Some("batch"), 2)).await.unwrap();
        store.save(&record("a", Some("batch"), 1)).await.unwrap();
        store.save(&record("c", Some("other"), 1)).await.unwrap();
        store.save(&record("d", None, 1)).await.unwrap();

        let batch = store.find_by_request("batch").await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn memory_store_evicts_oldest_beyond_capacity() {
        let store = MemoryStore::with_capacity(2);
        store.save(&record("a", Some("batch"), 1)).await.unwrap();
        store.save(&record("b", Some("batch"), 2)).await.unwrap();
        store.save(&record("c", Some("batch"), 3)).await.unwrap();

        assert_eq!(store.find("a").await.unwrap(), None);
        assert!(store.find("b").await.unwrap().is_some());
        assert!(store.find("c").await.unwrap().is_some());

        let ids: Vec<String> = store
            .find_by_request("batch")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn memory_store_resave_does_not_evict() {
        let store = MemoryStore::with_capacity(2);
        store.save(&record("a", None, 1)).await.unwrap();
        store.save(&record("b", None, 2)).await.unwrap();
        store.save(&record("a", None, 3)).await.unwrap();

        assert_eq!(store.find("a").await.unwrap().unwrap().created_at, 3);
        assert!(store.find("b").await.unwrap().is_some());
    }

    #[test]
    fn record_json_flattens_config() {
        let json = serde_json::to_value(record("a", None, 7)).unwrap();
        assert_eq!(json["endpoint"], "http://localhost/");
        assert_eq!(json["method"], "GET");
        assert_eq!(json["created_at"], 7);
        assert!(json.get("test_request_id").is_none());
        assert!(json["test_summary"].is_object());
    }
}
