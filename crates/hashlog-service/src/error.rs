//! Error types for the service and client.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

use crate::messages::{Status, StatusCode};

/// Errors that can occur while serving or calling the log service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Socket-level error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error (oversized or non-UTF-8 line).
    #[error("codec error: {0}")]
    Codec(#[from] LinesCodecError),

    /// Peer sent something that is not a valid frame at this point.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error frame.
    #[error("{code}: {message}")]
    Status { code: StatusCode, message: String },
}

impl ServiceError {
    /// The status code, if the server reported one.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            ServiceError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<Status> for ServiceError {
    fn from(status: Status) -> Self {
        ServiceError::Status {
            code: status.code,
            message: status.message,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
