//! Error types for the log engine.

use hashlog_core::CoreError;
use hashlog_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Payload could not be parsed as JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Partition does not exist.
    #[error("partition '{0}' not found")]
    NotFound(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Encoding, decoding or naming error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A follow-mode tail was cancelled.
    #[error("stream cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
