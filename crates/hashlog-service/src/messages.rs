//! Wire protocol message types.
//!
//! Every frame is one JSON value on its own line. Clients send a
//! [`Request`]; the server answers unary calls with a single [`Response`]
//! and streaming calls with `entry` frames closed by `end` or `error`.
//!
//! Frames are externally tagged: `{"read":{"partition":"p"}}`, or a bare
//! string such as `"cancel"` for variants without fields. Internally tagged
//! enums cannot carry numbers under serde_json's `arbitrary_precision`.

use std::fmt;

use hashlog::{Entry, VerifyFailure, VerifyOutcome, VerifyReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// Client requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Append a JSON payload, given as text.
    Append { partition: String, data: String },

    /// Stream stored entries.
    Read {
        partition: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_seq: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u64>,
    },

    /// Stream stored entries, then optionally follow new ones.
    Tail {
        partition: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_seq: Option<u64>,
        #[serde(default)]
        follow: bool,
        /// Begin at the last `n` entries.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last: Option<u64>,
    },

    /// Verify a partition's hash chain.
    Verify { partition: String },

    /// List partition storage keys.
    ListPartitions,

    /// Fetch the newest entry of a partition.
    GetLastEntry { partition: String },

    /// Stop the tail running on this connection.
    Cancel,
}

/// Server responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Appended(AppendResponse),
    Entry(WireEntry),
    /// A Read or Tail stream finished normally.
    End,
    Verified(VerifyResponse),
    Partitions { partitions: Vec<String> },
    LastEntry {
        found: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<WireEntry>,
    },
    Error(Status),
}

/// Result of an append.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppendResponse {
    pub success: bool,
    pub seq: u64,
    pub timestamp: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppendResponse {
    pub fn appended(entry: &Entry) -> Self {
        Self {
            success: true,
            seq: entry.seq,
            timestamp: entry.timestamp.clone(),
            hash: entry.hash.clone(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Result of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub entries_verified: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Index of the first offending entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_index: Option<u64>,
    /// Violation kind, e.g. `hash_mismatch` or `not_found`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<String>,
}

impl VerifyResponse {
    /// A response for a verification that could not run.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl From<VerifyReport> for VerifyResponse {
    fn from(report: VerifyReport) -> Self {
        match report.outcome {
            VerifyOutcome::Valid { final_hash } => Self {
                valid: true,
                entries_verified: report.entries_verified,
                final_hash: Some(final_hash),
                ..Default::default()
            },
            VerifyOutcome::Invalid(failure) => {
                let (failed_index, violation) = match &failure {
                    VerifyFailure::NotFound(_) => (None, "not_found"),
                    VerifyFailure::Violation(v) => (Some(v.index()), v.kind()),
                };
                Self {
                    valid: false,
                    entries_verified: report.entries_verified,
                    final_hash: None,
                    error: Some(failure.to_string()),
                    failed_index,
                    violation: Some(violation.to_string()),
                }
            }
        }
    }
}

/// An entry on the wire. `data` travels as JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub seq: u64,
    pub timestamp: String,
    pub partition: String,
    pub prev_hash: String,
    pub data: String,
    pub hash: String,
}

impl WireEntry {
    /// Decode back into an [`Entry`].
    pub fn into_entry(self) -> Result<Entry, ServiceError> {
        let data: Value = serde_json::from_str(&self.data)
            .map_err(|e| ServiceError::Protocol(format!("entry {} has invalid data: {}", self.seq, e)))?;
        Ok(Entry {
            seq: self.seq,
            timestamp: self.timestamp,
            partition: self.partition,
            prev_hash: self.prev_hash,
            data,
            hash: self.hash,
        })
    }
}

impl From<&Entry> for WireEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            seq: entry.seq,
            timestamp: entry.timestamp.clone(),
            partition: entry.partition.clone(),
            prev_hash: entry.prev_hash.clone(),
            data: entry.data.to_string(),
            hash: entry.hash.clone(),
        }
    }
}

/// Status codes carried by error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    NotFound,
    InvalidArgument,
    Internal,
    Cancelled,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// An error frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Cancelled, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashlog::core::{ChainViolation, EntryBuilder};
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let req: Request =
            serde_json::from_str(r#"{"tail":{"partition":"p","start_seq":3,"follow":true}}"#)
                .unwrap();
        assert_eq!(
            req,
            Request::Tail {
                partition: "p".into(),
                start_seq: Some(3),
                follow: true,
                last: None,
            }
        );

        let text = serde_json::to_string(&Request::ListPartitions).unwrap();
        assert_eq!(text, r#""list_partitions""#);

        let cancel: Request = serde_json::from_str(r#""cancel""#).unwrap();
        assert_eq!(cancel, Request::Cancel);
    }

    #[test]
    fn test_response_wire_format() {
        let text = serde_json::to_string(&Response::End).unwrap();
        assert_eq!(text, r#""end""#);

        let text = serde_json::to_string(&Response::Error(Status::not_found("gone"))).unwrap();
        assert_eq!(text, r#"{"error":{"code":"not_found","message":"gone"}}"#);

        let resp: Response = serde_json::from_str(
            r#"{"appended":{"success":true,"seq":18446744073709551615,"timestamp":"t","hash":"h"}}"#,
        )
        .unwrap();
        match resp {
            Response::Appended(appended) => assert_eq!(appended.seq, u64::MAX),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wire_entry_keeps_wide_integers() {
        let data: Value = serde_json::from_str(r#"{"n":100000000000000000000}"#).unwrap();
        let entry = EntryBuilder::genesis("p")
            .timestamp("2024-01-01T00:00:00.000000+00:00")
            .data(data)
            .build();

        let wire = WireEntry::from(&entry);
        assert_eq!(wire.data, r#"{"n":100000000000000000000}"#);
        let back = wire.into_entry().unwrap();
        assert!(back.has_valid_hash());
        assert_eq!(back, entry);
    }

    #[test]
    fn test_wire_entry_keeps_hash_valid() {
        let entry = EntryBuilder::genesis("p")
            .timestamp("2024-01-01T00:00:00.000000+00:00")
            .data(json!({"b": [1, 2.5, null], "a": "x"}))
            .build();

        let wire = WireEntry::from(&entry);
        let back = wire.into_entry().unwrap();
        assert_eq!(back, entry);
        assert!(back.has_valid_hash());
    }

    #[test]
    fn test_verify_response_from_broken_report() {
        let report = VerifyReport::invalid(
            3,
            VerifyFailure::Violation(ChainViolation::SequenceMismatch {
                index: 3,
                expected: 3,
                found: 9,
            }),
        );
        let resp = VerifyResponse::from(report);
        assert!(!resp.valid);
        assert_eq!(resp.failed_index, Some(3));
        assert_eq!(resp.violation.as_deref(), Some("sequence_mismatch"));
        assert_eq!(
            resp.error.as_deref(),
            Some("sequence mismatch at entry 3: expected 3, got 9")
        );
    }

    #[test]
    fn test_verify_response_not_found() {
        let resp = VerifyResponse::from(VerifyReport::not_found("q"));
        assert!(!resp.valid);
        assert_eq!(resp.entries_verified, 0);
        assert_eq!(resp.violation.as_deref(), Some("not_found"));
        assert_eq!(resp.error.as_deref(), Some("partition 'q' not found"));
    }
}
