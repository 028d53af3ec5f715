//! Entry: one immutable record in a partition's hash chain.
//!
//! An entry is created exactly once, by an append, and never edited. Its
//! `hash` commits to every other field, and its `prev_hash` commits to the
//! entry before it.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::hash_fields;
use crate::crypto::{Sha256Hash, GENESIS_HASH};
use crate::error::{CoreError, Result};

/// The hashed fields of an entry, borrowed.
#[derive(Debug, Clone, Copy)]
pub struct EntryFields<'a> {
    pub seq: u64,
    pub timestamp: &'a str,
    pub partition: &'a str,
    pub prev_hash: &'a str,
    pub data: &'a Value,
}

impl EntryFields<'_> {
    /// Compute the content hash of these fields.
    pub fn compute_hash(&self) -> Sha256Hash {
        hash_fields(self)
    }
}

/// A stored log entry.
///
/// Field order here is the on-disk key order of a stored line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Position in the partition, starting at 0.
    pub seq: u64,

    /// Wall-clock creation time (RFC 3339, UTC). Not guaranteed monotonic.
    #[serde(rename = "ts")]
    pub timestamp: String,

    /// Logical partition name as given to append.
    pub partition: String,

    /// Hex hash of the previous entry, or [`GENESIS_HASH`].
    pub prev_hash: String,

    /// Opaque application payload.
    pub data: Value,

    /// Hex SHA-256 of the canonical encoding of the fields above.
    pub hash: String,
}

impl Entry {
    /// Borrow the hashed fields.
    pub fn fields(&self) -> EntryFields<'_> {
        EntryFields {
            seq: self.seq,
            timestamp: &self.timestamp,
            partition: &self.partition,
            prev_hash: &self.prev_hash,
            data: &self.data,
        }
    }

    /// Recompute the content hash from the hashed fields.
    pub fn compute_hash(&self) -> Sha256Hash {
        self.fields().compute_hash()
    }

    /// Whether the stored hash matches the recomputed one.
    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash().to_hex() == self.hash
    }

    /// Whether this is the first entry of its partition.
    pub fn is_genesis(&self) -> bool {
        self.seq == 0 && self.prev_hash == GENESIS_HASH
    }

    /// Encode as a single storage line (without the trailing newline).
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Decode from a storage line.
    pub fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// Builder for new entries.
///
/// Use [`EntryBuilder::genesis`] for the first entry of a partition and
/// [`EntryBuilder::after`] to chain onto an existing entry.
pub struct EntryBuilder {
    seq: u64,
    partition: String,
    prev_hash: String,
    timestamp: Option<String>,
    data: Value,
}

impl EntryBuilder {
    /// Start an entry at an explicit position.
    pub fn new(seq: u64, partition: impl Into<String>, prev_hash: impl Into<String>) -> Self {
        Self {
            seq,
            partition: partition.into(),
            prev_hash: prev_hash.into(),
            timestamp: None,
            data: Value::Null,
        }
    }

    /// Start the first entry of a partition.
    pub fn genesis(partition: impl Into<String>) -> Self {
        Self::new(0, partition, GENESIS_HASH)
    }

    /// Start the entry that follows `prev`.
    pub fn after(prev: &Entry, partition: impl Into<String>) -> Self {
        Self::new(prev.seq + 1, partition, prev.hash.clone())
    }

    /// Start the entry that follows `prev`, or the genesis entry if `None`.
    pub fn next(prev: Option<&Entry>, partition: impl Into<String>) -> Self {
        match prev {
            Some(prev) => Self::after(prev, partition),
            None => Self::genesis(partition),
        }
    }

    /// Set the timestamp. Defaults to the current time.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Set the payload.
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Stamp and hash the entry.
    pub fn build(self) -> Entry {
        let timestamp = self.timestamp.unwrap_or_else(now_timestamp);
        let hash = EntryFields {
            seq: self.seq,
            timestamp: &timestamp,
            partition: &self.partition,
            prev_hash: &self.prev_hash,
            data: &self.data,
        }
        .compute_hash()
        .to_hex();

        Entry {
            seq: self.seq,
            timestamp,
            partition: self.partition,
            prev_hash: self.prev_hash,
            data: self.data,
            hash,
        }
    }
}

/// Current UTC time as RFC 3339 with microseconds, e.g.
/// `2024-06-15T12:30:45.123456+00:00`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
