//! Hash chain verification.
//!
//! [`ChainVerifier`] walks a partition's entries in order and re-derives the
//! chain invariants:
//!
//! 1. the first entry's `prev_hash` is the genesis hash
//! 2. every later `prev_hash` equals the previous entry's `hash`
//! 3. `seq` equals the entry's position
//! 4. `hash` equals the recomputed content hash
//!
//! Checks run in the order seq, prev_hash, hash, and stop at the first
//! violation.

use thiserror::Error;

use crate::crypto::GENESIS_HASH;
use crate::entry::Entry;
use crate::error::ChainViolation;

/// Incremental chain verifier. Pure: performs no I/O.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    verified: u64,
    head_hash: String,
}

impl ChainVerifier {
    /// Create a verifier positioned before the first entry.
    pub fn new() -> Self {
        Self {
            verified: 0,
            head_hash: GENESIS_HASH.to_string(),
        }
    }

    /// Check the next entry in the chain.
    pub fn check(&mut self, entry: &Entry) -> Result<(), ChainViolation> {
        let index = self.verified;

        if entry.seq != index {
            return Err(ChainViolation::SequenceMismatch {
                index,
                expected: index,
                found: entry.seq,
            });
        }

        if entry.prev_hash != self.head_hash {
            return Err(ChainViolation::ChainBroken {
                index,
                expected: self.head_hash.clone(),
                found: entry.prev_hash.clone(),
            });
        }

        let computed = entry.compute_hash().to_hex();
        if computed != entry.hash {
            return Err(ChainViolation::HashMismatch {
                index,
                expected: computed,
                found: entry.hash.clone(),
            });
        }

        self.head_hash = entry.hash.clone();
        self.verified += 1;
        Ok(())
    }

    /// Decode a storage line and check it.
    pub fn check_line(&mut self, line: &str) -> Result<(), ChainViolation> {
        let entry = Entry::from_line(line).map_err(|e| ChainViolation::Malformed {
            index: self.verified,
            reason: e.to_string(),
        })?;
        self.check(&entry)
    }

    /// Number of entries verified so far.
    pub fn entries_verified(&self) -> u64 {
        self.verified
    }

    /// Hash of the last verified entry, or the genesis hash.
    pub fn head_hash(&self) -> &str {
        &self.head_hash
    }

    /// Finish a walk that found no violation.
    pub fn into_report(self) -> VerifyReport {
        VerifyReport::valid(self.verified, self.head_hash)
    }

    /// Finish a walk that stopped at `violation`.
    pub fn into_broken_report(self, violation: ChainViolation) -> VerifyReport {
        VerifyReport::invalid(self.verified, VerifyFailure::Violation(violation))
    }
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a verification did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("partition '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Violation(#[from] ChainViolation),
}

/// The verdict of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Every entry satisfied the invariants.
    Valid { final_hash: String },
    /// Verification stopped early.
    Invalid(VerifyFailure),
}

/// Structured verification result. Domain problems (missing partition,
/// broken chain) are reported here rather than raised as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries that passed every check before the walk ended.
    pub entries_verified: u64,
    pub outcome: VerifyOutcome,
}

impl VerifyReport {
    pub fn valid(entries_verified: u64, final_hash: String) -> Self {
        Self {
            entries_verified,
            outcome: VerifyOutcome::Valid { final_hash },
        }
    }

    pub fn invalid(entries_verified: u64, failure: VerifyFailure) -> Self {
        Self {
            entries_verified,
            outcome: VerifyOutcome::Invalid(failure),
        }
    }

    /// Report for a partition that does not exist.
    pub fn not_found(partition: &str) -> Self {
        Self::invalid(0, VerifyFailure::NotFound(partition.to_string()))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.outcome, VerifyOutcome::Valid { .. })
    }

    /// Hash of the last entry, if the chain is valid.
    pub fn final_hash(&self) -> Option<&str> {
        match &self.outcome {
            VerifyOutcome::Valid { final_hash } => Some(final_hash),
            VerifyOutcome::Invalid(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&VerifyFailure> {
        match &self.outcome {
            VerifyOutcome::Valid { .. } => None,
            VerifyOutcome::Invalid(failure) => Some(failure),
        }
    }

    /// The chain violation, if verification stopped at one.
    pub fn violation(&self) -> Option<&ChainViolation> {
        match self.failure() {
            Some(VerifyFailure::Violation(v)) => Some(v),
            _ => None,
        }
    }
}

/// Verify an in-memory sequence of entries.
pub fn verify_chain<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> VerifyReport {
    let mut verifier = ChainVerifier::new();
    for entry in entries {
        if let Err(violation) = verifier.check(entry) {
            return verifier.into_broken_report(violation);
        }
    }
    verifier.into_report()
}
