//! The LogEngine: append, read, tail and verify over partitions.
//!
//! The engine owns the hash chain. Stores only see lines; every entry is
//! built, hashed and decoded here.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use hashlog_core::{
    now_timestamp, ChainVerifier, CoreError, Entry, EntryBuilder, PartitionKey, VerifyReport,
};
use hashlog_store::PartitionStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::locks::PartitionLocks;
use crate::stream::{read_stream, tail_stream, EntryStream, ReadOptions, TailOptions, TailSource};

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often a following tail re-checks storage for entries written
    /// outside this engine.
    pub tail_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tail_poll_interval: Duration::from_millis(100),
        }
    }
}

/// Result of appending a raw JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Entry was chained and stored.
    Appended(Entry),
    /// Payload or partition name was rejected; nothing was written.
    Rejected { reason: String },
}

impl AppendOutcome {
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            AppendOutcome::Appended(entry) => Some(entry),
            AppendOutcome::Rejected { .. } => None,
        }
    }
}

/// The main engine struct.
///
/// Cheap to clone; clones share the store and the lock table.
pub struct LogEngine<S: PartitionStore> {
    store: Arc<S>,
    config: EngineConfig,
    locks: Arc<PartitionLocks>,
}

impl<S: PartitionStore> Clone for LogEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S: PartitionStore> LogEngine<S> {
    /// Create an engine over `store`.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            locks: Arc::new(PartitionLocks::default()),
        }
    }

    /// Create an engine with the default configuration.
    pub fn with_store(store: S) -> Self {
        Self::new(store, EngineConfig::default())
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append `data` to `partition`, creating the partition if needed.
    ///
    /// Appends to the same partition are serialized; appends to different
    /// partitions proceed independently.
    pub async fn append(&self, partition: &str, data: Value) -> Result<Entry> {
        let key = PartitionKey::new(partition)?;
        let slot = self.locks.slot(&key);

        let entry = {
            let _guard = slot.write.lock().await;
            let last = self.last_entry(&key).await?;
            let entry = EntryBuilder::next(last.as_ref(), partition)
                .timestamp(now_timestamp())
                .data(data)
                .build();
            self.store.append_line(&key, &entry.to_line()?).await?;
            entry
        };
        slot.notify_appended();

        tracing::debug!(partition, seq = entry.seq, hash = %entry.hash, "appended entry");
        Ok(entry)
    }

    /// Parse `raw` as JSON and append it.
    ///
    /// Bad input is reported as [`AppendOutcome::Rejected`]. Storage
    /// failures and an undecodable last entry are errors.
    pub async fn append_json(&self, partition: &str, raw: &str) -> Result<AppendOutcome> {
        let data: Value = match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(e) => {
                let reason = EngineError::InvalidPayload(e.to_string()).to_string();
                tracing::debug!(partition, %reason, "rejected append");
                return Ok(AppendOutcome::Rejected { reason });
            }
        };

        match self.append(partition, data).await {
            Ok(entry) => Ok(AppendOutcome::Appended(entry)),
            Err(EngineError::Core(e @ CoreError::InvalidPartition(_))) => {
                Ok(AppendOutcome::Rejected {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the most recent entry of a partition.
    pub async fn get_last_entry(&self, partition: &str) -> Result<Option<Entry>> {
        let key = PartitionKey::new(partition)?;
        self.last_entry(&key).await
    }

    async fn last_entry(&self, key: &PartitionKey) -> Result<Option<Entry>> {
        match self.store.read_last(key).await? {
            Some(line) => Ok(Some(Entry::from_line(&line)?)),
            None => Ok(None),
        }
    }

    /// Stream the entries of a partition in order.
    pub async fn read(&self, partition: &str, options: ReadOptions) -> Result<EntryStream> {
        let key = PartitionKey::new(partition)?;
        let reader = self
            .store
            .read_all(&key)
            .await?
            .ok_or_else(|| EngineError::NotFound(partition.to_string()))?;
        Ok(read_stream(reader, options))
    }

    /// Stream existing entries and, with `follow`, new ones until `cancel`
    /// fires.
    pub async fn tail(
        &self,
        partition: &str,
        mut options: TailOptions,
        cancel: CancellationToken,
    ) -> Result<EntryStream> {
        let key = PartitionKey::new(partition)?;
        let slot = self.locks.slot(&key);
        let appended = slot.appended.subscribe();
        let reader = self
            .store
            .read_all(&key)
            .await?
            .ok_or_else(|| EngineError::NotFound(partition.to_string()))?;

        // Sequence numbers are contiguous, so the last `n` entries start at
        // `next - n`.
        if let Some(n) = options.last {
            let next = self.last_entry(&key).await?.map_or(0, |e| e.seq + 1);
            options.start_seq = options.start_seq.max(next.saturating_sub(n));
        }

        tracing::debug!(
            partition,
            start_seq = options.start_seq,
            follow = options.follow,
            last = ?options.last,
            "opened tail"
        );
        let source = TailSource {
            reader,
            slot,
            appended,
            poll_interval: self.config.tail_poll_interval,
        };
        Ok(tail_stream(source, options, cancel))
    }

    /// Re-derive and check the hash chain of a partition.
    ///
    /// A missing partition or a broken chain is reported in the
    /// [`VerifyReport`]; only storage failures are errors.
    pub async fn verify(&self, partition: &str) -> Result<VerifyReport> {
        let key = PartitionKey::new(partition)?;
        let Some(mut reader) = self.store.read_all(&key).await? else {
            return Ok(VerifyReport::not_found(partition));
        };

        let mut verifier = ChainVerifier::new();
        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(violation) = verifier.check_line(&line) {
                tracing::warn!(partition, %violation, "hash chain verification failed");
                return Ok(verifier.into_broken_report(violation));
            }
        }

        let report = verifier.into_report();
        tracing::debug!(partition, entries = report.entries_verified, "verified partition");
        Ok(report)
    }

    /// List the storage keys of all partitions, sorted.
    pub async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.list_partitions().await?)
    }
}
