// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use wr_fs::FsError;

/// Where in the log a corruption was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionLocation {
    Head,
    Tail,
}

impl CorruptionLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorruptionLocation::Head => "head",
            CorruptionLocation::Tail => "tail",
        }
    }
}

/// Why a corruption was detected (spec §4.3, §8.2 scenarios D/E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionReason {
    DigestMismatch,
    MissingAttestedSegment,
    PinAfterClose,
}

impl CorruptionReason {
    pub fn code(&self) -> &'static str {
        match self {
            CorruptionReason::DigestMismatch => "digest_mismatch",
            CorruptionReason::MissingAttestedSegment => "missing_attested_segment",
            CorruptionReason::PinAfterClose => "pin_after_close",
        }
    }
}

/// The closed error set for the event log store and snapshot CAS.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("canonical serialization error: {0}")]
    Canonical(#[from] wr_core::canonical::CanonicalError),

    #[error("Missing execution snapshot: {snapshot_ref}")]
    MissingSnapshot { snapshot_ref: String },

    #[error("session store corruption detected at {location:?}: {reason:?}")]
    Corruption {
        location: CorruptionLocation,
        reason: CorruptionReason,
    },

    #[error("session store invariant violation: witness misuse-after-release")]
    WitnessMisuseAfterRelease,

    #[error("event {event_index} violates dense-eventIndex invariant (expected {expected})")]
    NonDenseEventIndex { event_index: u64, expected: u64 },

    #[error("node_created must precede events scoped to node {node_id}")]
    NodeCreatedMustPrecedeScope { node_id: String },
}

impl StoreError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            StoreError::Corruption { .. } => "SESSION_STORE_CORRUPTION_DETECTED",
            StoreError::WitnessMisuseAfterRelease => "SESSION_STORE_INVARIANT_VIOLATION",
            StoreError::Fs(_)
            | StoreError::Serialize(_)
            | StoreError::Canonical(_)
            | StoreError::MissingSnapshot { .. }
            | StoreError::NonDenseEventIndex { .. }
            | StoreError::NodeCreatedMustPrecedeScope { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
