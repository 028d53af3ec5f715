//! # Hashlog Testkit
//!
//! Testing utilities for hashlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known entries with expected hashes for cross-implementation verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Temporary-directory engines and stream helpers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use hashlog_testkit::vectors::{all_vectors, entry_from_vector};
//!
//! for vector in all_vectors() {
//!     let entry = entry_from_vector(&vector);
//!     assert_eq!(entry.hash, vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hashlog_testkit::generators::json_value;
//!
//! proptest! {
//!     #[test]
//!     fn canonical_is_ascii(data in json_value()) {
//!         prop_assert!(hashlog_core::canonical_json(&data).is_ascii());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use hashlog_testkit::fixtures::{populate, TestLog};
//!
//! async fn example() {
//!     let log = TestLog::new();
//!     populate(&log.engine, "orders", 10).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{collect_entries, make_chain, memory_engine, populate, TestLog};
pub use generators::{json_value, partition_name, raw_partition_name};
pub use vectors::{all_vectors, entry_from_vector, verify_all_vectors, GoldenVector};
