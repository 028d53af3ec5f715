//! # Hashlog
//!
//! A partitioned, append-only, hash-chained event log.
//!
//! ## Overview
//!
//! Each partition is an independent, totally ordered sequence of immutable
//! entries. Every entry embeds the hash of its predecessor, so tampering or
//! reordering is detectable by a linear scan.
//!
//! - **Append**: serialized per partition, never blocking other partitions
//! - **Read**: lazy stream over a committed prefix, with start and limit
//! - **Tail**: read that optionally follows new appends until cancelled
//! - **Verify**: re-derives the chain and reports the first violation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use hashlog::{LogEngine, ReadOptions};
//! use hashlog::store::FileStore;
//! use serde_json::json;
//!
//! async fn example() {
//!     let engine = LogEngine::with_store(FileStore::open("logs").unwrap());
//!
//!     let entry = engine.append("orders", json!({"id": 1})).await.unwrap();
//!     assert_eq!(entry.seq, 0);
//!
//!     let mut entries = engine.read("orders", ReadOptions::default()).await.unwrap();
//!     while let Some(entry) = entries.next().await {
//!         println!("{:?}", entry.unwrap());
//!     }
//!
//!     assert!(engine.verify("orders").await.unwrap().is_valid());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hashlog::core` - Entries, canonical encoding, chain verification
//! - `hashlog::store` - Partition storage

pub mod engine;
pub mod error;
mod locks;
pub mod stream;

// Re-export component crates
pub use hashlog_core as core;
pub use hashlog_store as store;

// Re-export main types for convenience
pub use engine::{AppendOutcome, EngineConfig, LogEngine};
pub use error::{EngineError, Result};
pub use stream::{EntryStream, ReadOptions, TailOptions};

// Re-export commonly used core types
pub use hashlog_core::{ChainViolation, Entry, VerifyFailure, VerifyOutcome, VerifyReport, GENESIS_HASH};
pub use tokio_util::sync::CancellationToken;
