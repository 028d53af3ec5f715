//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error from the backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes are not a valid line (e.g. not UTF-8).
    #[error("invalid data in partition {partition}: {reason}")]
    InvalidData { partition: String, reason: String },

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
