//! # Hashlog Core
//!
//! Pure primitives for hashlog: entries, canonical encoding, and hash chain
//! verification.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the hash chain.
//!
//! ## Key Types
//!
//! - [`Entry`] - One immutable record in a partition
//! - [`PartitionKey`] - Sanitized partition name used as a storage key
//! - [`Sha256Hash`] - Content hash; [`GENESIS_HASH`] marks "no predecessor"
//! - [`ChainVerifier`] - Incremental invariant checker
//!
//! ## Canonicalization
//!
//! Entry hashes are computed over canonical JSON. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod types;
pub mod validation;

pub use canonical::{canonical_entry_bytes, canonical_json, hash_fields};
pub use crypto::{Sha256Hash, GENESIS_HASH};
pub use entry::{now_timestamp, Entry, EntryBuilder, EntryFields};
pub use error::{ChainViolation, CoreError};
pub use types::PartitionKey;
pub use validation::{verify_chain, ChainVerifier, VerifyFailure, VerifyOutcome, VerifyReport};
