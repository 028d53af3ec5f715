//! Store traits: the abstract interface for partition persistence.
//!
//! These traits keep the engine storage-agnostic. Implementations include
//! a directory of newline-delimited files (primary) and in-memory (tests).

use std::collections::BTreeSet;

use async_trait::async_trait;
use hashlog_core::PartitionKey;

use crate::error::Result;

/// A lazy, forward-only reader over a partition's complete lines.
///
/// Only newline-terminated lines are ever returned; a trailing fragment
/// (a write still in progress) stays buffered. After `next_line` returns
/// `Ok(None)` the reader may be polled again and resumes where it stopped,
/// picking up anything appended in the meantime.
#[async_trait]
pub trait LineReader: Send {
    /// Return the next complete line, without its terminator.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// The PartitionStore trait: async interface for append-only partitions.
///
/// # Design Notes
///
/// - **Append-only**: existing bytes are never rewritten.
/// - **Whole lines**: readers only consume newline-terminated lines, so a
///   concurrent append is never observed half-written.
/// - **Absence is not an error**: missing partitions yield `None`/`false`.
#[async_trait]
pub trait PartitionStore: Send + Sync + 'static {
    /// Append one line (the terminator is added by the store).
    async fn append_line(&self, key: &PartitionKey, line: &str) -> Result<()>;

    /// Open a reader positioned at the first line of the partition.
    ///
    /// Each call rescans from the start. Returns `None` if the partition
    /// does not exist.
    async fn read_all(&self, key: &PartitionKey) -> Result<Option<Box<dyn LineReader>>>;

    /// Get the last complete, non-blank line of the partition.
    async fn read_last(&self, key: &PartitionKey) -> Result<Option<String>>;

    /// Check whether the partition exists.
    async fn exists(&self, key: &PartitionKey) -> Result<bool>;

    /// List the storage keys of all partitions, sorted.
    async fn list_partitions(&self) -> Result<BTreeSet<String>>;
}
