//! # Hashlog Store
//!
//! Storage abstraction for hashlog. Provides a trait-based interface for
//! append-only partitions with file-backed and in-memory implementations.
//!
//! ## Overview
//!
//! The store deals in lines only: it knows nothing about entries, hashes or
//! JSON. The engine serializes entries and hands lines to a
//! [`PartitionStore`]. The primary implementation is [`FileStore`], with
//! [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`PartitionStore`] - The async trait for all storage operations
//! - [`LineReader`] - Lazy, resumable reader over complete lines
//! - [`FileStore`] - One `<key>.jsonl` file per partition
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hashlog_core::PartitionKey;
//! use hashlog_store::{FileStore, PartitionStore};
//!
//! async fn example() {
//!     let store = FileStore::open("logs").unwrap();
//!     let key = PartitionKey::new("orders").unwrap();
//!     store.append_line(&key, "{}").await.unwrap();
//!     let last = store.read_last(&key).await.unwrap();
//!     assert_eq!(last.as_deref(), Some("{}"));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Torn tails**: an unterminated final line is invisible to readers and
//!   gets terminated by the next append
//! - **Tail reads**: `read_last` scans backwards in a doubling window, so
//!   its cost depends on the last line, not the partition size

pub mod error;
pub mod file;
mod lines;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::{FileStore, FileStoreConfig, SyncPolicy, PARTITION_EXTENSION};
pub use memory::MemoryStore;
pub use traits::{LineReader, PartitionStore};
