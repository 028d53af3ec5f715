//! Strong type definitions for hashlog.
//!
//! Partition names are user input; storage keys are what backends see.
//! Keeping them as distinct types stops an unsanitized name from ever
//! reaching a filesystem path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// A sanitized partition name, safe to use as a storage key.
///
/// Alphanumeric characters, `-` and `_` are kept; everything else is
/// replaced by `_`. Two logical names that sanitize to the same key refer
/// to the same partition.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Sanitize a logical partition name into a storage key.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(CoreError::InvalidPartition(
                "partition name must not be empty".into(),
            ));
        }
        let key = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Ok(Self(key))
    }

    /// Wrap a string that is already a storage key (e.g. a file stem).
    ///
    /// Returns `None` if the string would not survive sanitization unchanged.
    pub fn from_storage(key: &str) -> Option<Self> {
        let candidate = Self::new(key).ok()?;
        (candidate.0 == key).then_some(candidate)
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionKey({})", self.0)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartitionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
