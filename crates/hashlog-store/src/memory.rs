//! In-memory implementation of the PartitionStore trait.
//!
//! This is primarily for testing. It has the same line semantics as the
//! file store but keeps raw partition bytes in memory, and exposes raw
//! access so tests can simulate torn writes and tampering.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use hashlog_core::PartitionKey;

use crate::error::Result;
use crate::lines::{decode_line, last_complete_line, LastLine, LineBuffer};
use crate::traits::{LineReader, PartitionStore};

type Partitions = Arc<RwLock<HashMap<PartitionKey, Vec<u8>>>>;

/// In-memory store implementation.
///
/// All data is lost when the last clone is dropped. Thread-safe via RwLock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    partitions: Partitions,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes with no framing.
    pub fn append_raw(&self, key: &PartitionKey, bytes: &[u8]) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions
            .entry(key.clone())
            .or_default()
            .extend_from_slice(bytes);
    }

    /// Replace a partition's contents wholesale.
    pub fn replace_raw(&self, key: &PartitionKey, bytes: Vec<u8>) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions.insert(key.clone(), bytes);
    }

    /// Snapshot of a partition's raw bytes.
    pub fn raw(&self, key: &PartitionKey) -> Option<Vec<u8>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.get(key).cloned()
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn append_line(&self, key: &PartitionKey, line: &str) -> Result<()> {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        let bytes = partitions.entry(key.clone()).or_default();
        if bytes.last().is_some_and(|b| *b != b'\n') {
            tracing::warn!(partition = key.as_str(), "partition ends with a torn line, terminating it");
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        Ok(())
    }

    async fn read_all(&self, key: &PartitionKey) -> Result<Option<Box<dyn LineReader>>> {
        if !self.exists(key).await? {
            return Ok(None);
        }
        Ok(Some(Box::new(MemoryLineReader {
            partitions: self.partitions.clone(),
            key: key.clone(),
            offset: 0,
            buffer: LineBuffer::default(),
        })))
    }

    async fn read_last(&self, key: &PartitionKey) -> Result<Option<String>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        let Some(bytes) = partitions.get(key) else {
            return Ok(None);
        };
        match last_complete_line(bytes, true) {
            LastLine::Found(range) => decode_line(bytes[range].to_vec(), key.as_str()).map(Some),
            LastLine::Absent | LastLine::NeedMore => Ok(None),
        }
    }

    async fn exists(&self, key: &PartitionKey) -> Result<bool> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.contains_key(key))
    }

    async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.keys().map(|k| k.as_str().to_string()).collect())
    }
}

struct MemoryLineReader {
    partitions: Partitions,
    key: PartitionKey,
    offset: usize,
    buffer: LineBuffer,
}

#[async_trait]
impl LineReader for MemoryLineReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.buffer.next_line(self.key.as_str())? {
                return Ok(Some(line));
            }
            let copied = {
                let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
                match partitions.get(&self.key) {
                    Some(bytes) if bytes.len() > self.offset => {
                        self.buffer.push(&bytes[self.offset..]);
                        let n = bytes.len() - self.offset;
                        self.offset = bytes.len();
                        n
                    }
                    _ => 0,
                }
            };
            if copied == 0 {
                return Ok(None);
            }
        }
    }
}
