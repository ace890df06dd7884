// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use wr_fs::FsError;
use wr_storage::{CorruptionLocation, StoreError};

/// Errors from `SessionLock::acquire` (spec §4.2).
#[derive(Debug, Error)]
pub enum LockError {
    #[error("session lock busy, retry after {after_ms}ms")]
    Busy { after_ms: u64 },

    #[error("session lock is reentrant: already held by this process")]
    Reentrant,

    #[error("lock file is corrupt")]
    Corrupt,

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from `ExecutionSessionGate::with_healthy_session_lock` (spec §4.4).
#[derive(Debug, Error)]
pub enum GateError<E: std::fmt::Debug + std::fmt::Display> {
    #[error("session locked, retry after {after_ms}ms")]
    SessionLocked { after_ms: u64 },

    #[error("failed to release lock")]
    LockReleaseFailed,

    #[error("session not healthy: {health} ({reason})")]
    SessionNotHealthy { health: &'static str, reason: String },

    #[error("failed to load session: {0}")]
    SessionLoadFailed(#[source] StoreError),

    #[error("failed to acquire lock: {0}")]
    LockAcquireFailed(#[source] LockError),

    #[error("gate callback failed: {0}")]
    GateCallbackFailed(E),

    #[error("session lock is reentrant: already held by this process")]
    SessionLockReentrant,
}

impl<E: std::fmt::Debug + std::fmt::Display> GateError<E> {
    pub fn wire_code(&self) -> &'static str {
        match self {
            GateError::SessionLocked { .. } => "SESSION_LOCKED",
            GateError::LockReleaseFailed => "LOCK_RELEASE_FAILED",
            GateError::SessionNotHealthy { .. } => "SESSION_NOT_HEALTHY",
            GateError::SessionLoadFailed(_) => "SESSION_LOAD_FAILED",
            GateError::LockAcquireFailed(_) => "LOCK_ACQUIRE_FAILED",
            GateError::GateCallbackFailed(_) => "GATE_CALLBACK_FAILED",
            GateError::SessionLockReentrant => "SESSION_LOCK_REENTRANT",
        }
    }

    pub(crate) fn from_lock_error(err: LockError) -> Self {
        match err {
            LockError::Busy { after_ms } => GateError::SessionLocked { after_ms },
            LockError::Reentrant => GateError::SessionLockReentrant,
            other => GateError::LockAcquireFailed(other),
        }
    }

    pub(crate) fn from_load_error(err: StoreError) -> Self {
        match &err {
            StoreError::Corruption { location, .. } => GateError::SessionNotHealthy {
                health: match location {
                    CorruptionLocation::Head => "corrupt_head",
                    CorruptionLocation::Tail => "corrupt_tail",
                },
                reason: err.to_string(),
            },
            _ => GateError::SessionLoadFailed(err),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
