//! Error types for hashlog core.

use thiserror::Error;

/// Core errors that can occur while building or decoding entries.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid partition name: {0}")]
    InvalidPartition(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// A break in a partition's hash chain, found by verification.
///
/// `index` is the zero-based position of the offending entry in the
/// partition (blank lines are not counted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("sequence mismatch at entry {index}: expected {expected}, got {found}")]
    SequenceMismatch { index: u64, expected: u64, found: u64 },

    #[error("hash chain broken at entry {index}: expected prev_hash {expected}, got {found}")]
    ChainBroken {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("hash mismatch at entry {index}: computed {expected}, stored {found}")]
    HashMismatch {
        index: u64,
        expected: String,
        found: String,
    },

    #[error("malformed entry at {index}: {reason}")]
    Malformed { index: u64, reason: String },
}

impl ChainViolation {
    /// Index of the first entry that failed verification.
    pub fn index(&self) -> u64 {
        match self {
            ChainViolation::SequenceMismatch { index, .. }
            | ChainViolation::ChainBroken { index, .. }
            | ChainViolation::HashMismatch { index, .. }
            | ChainViolation::Malformed { index, .. } => *index,
        }
    }

    /// Short machine-readable name of the violation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainViolation::SequenceMismatch { .. } => "sequence_mismatch",
            ChainViolation::ChainBroken { .. } => "chain_broken",
            ChainViolation::HashMismatch { .. } => "hash_mismatch",
            ChainViolation::Malformed { .. } => "malformed",
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
