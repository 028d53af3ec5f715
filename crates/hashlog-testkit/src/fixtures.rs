//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::time::Duration;

use futures_util::StreamExt;
use hashlog::{EngineConfig, EntryStream, LogEngine, Result};
use hashlog_core::{Entry, EntryBuilder};
use hashlog_store::{FileStore, FileStoreConfig, MemoryStore};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Fixed timestamp for hand-built entries.
pub const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00.000000+00:00";

/// An engine over a file store in a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TestLog {
    pub dir: TempDir,
    pub engine: LogEngine<FileStore>,
}

impl TestLog {
    /// Create a fixture with default configuration.
    pub fn new() -> Self {
        Self::with_configs(FileStoreConfig::default(), fast_config())
    }

    /// Create a fixture with explicit store and engine configuration.
    pub fn with_configs(store: FileStoreConfig, engine: EngineConfig) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let store = FileStore::open_with_config(dir.path(), store).expect("open file store");
        Self {
            engine: LogEngine::new(store, engine),
            dir,
        }
    }

    /// Path of the file backing `partition`.
    pub fn partition_path(&self, partition: &str) -> std::path::PathBuf {
        let key = hashlog_core::PartitionKey::new(partition).expect("valid partition");
        self.engine.store().partition_path(&key)
    }

    /// A second engine over the same directory, sharing no in-process
    /// state with the first.
    pub fn reopen(&self) -> LogEngine<FileStore> {
        let store = FileStore::open(self.dir.path()).expect("reopen file store");
        LogEngine::new(store, fast_config())
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine configuration with a short poll interval, so tests that rely on
/// polling finish quickly.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        tail_poll_interval: Duration::from_millis(10),
    }
}

/// An engine over a fresh in-memory store.
pub fn memory_engine() -> LogEngine<MemoryStore> {
    LogEngine::new(MemoryStore::new(), fast_config())
}

/// Payload used by [`populate`] for entry `i`.
pub fn sample_payload(i: u64) -> Value {
    json!({ "i": i, "kind": "sample" })
}

/// Append `count` sample entries to `partition`.
pub async fn populate<S: hashlog_store::PartitionStore>(
    engine: &LogEngine<S>,
    partition: &str,
    count: u64,
) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count {
        entries.push(engine.append(partition, sample_payload(i)).await?);
    }
    Ok(entries)
}

/// Drain a finite stream, stopping at the first error.
pub async fn collect_entries(mut stream: EntryStream) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    while let Some(item) = stream.next().await {
        entries.push(item?);
    }
    Ok(entries)
}

/// Build a valid chain of `count` entries without an engine.
pub fn make_chain(partition: &str, count: u64) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let entry = EntryBuilder::next(entries.last(), partition)
            .timestamp(FIXED_TIMESTAMP)
            .data(sample_payload(i))
            .build();
        entries.push(entry);
    }
    entries
}
