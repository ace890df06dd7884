// SPDX-License-Identifier: MIT OR Apache-2.0

//! The outward-facing error union (spec §7) and its exhaustive mapping to
//! the closed wire error-code set (spec §6.3).

use thiserror::Error;
use wr_session::{GateError, LockError};
use wr_storage::StoreError;
use wr_token::TokenError;

use crate::workflow::{AdvanceError, ProviderError};

/// Why a token failed scope validation (spec §4.5.3) — not a codec-level
/// concern, since it requires cross-referencing the session's own event
/// log, which `wr-token` never sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMismatchReason {
    StateAckSessionMismatch,
    StateAckRunMismatch,
    StateAckNodeMismatch,
    TerminalBlockCannotBeRetried,
}

/// The engine's closed error union. Every variant maps to exactly one wire
/// code in [`EngineError::wire_code`]; the match has no wildcard arm so a
/// new variant is a compile error at the mapping site until handled.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("session not healthy: {0}")]
    SessionNotHealthy(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("token scope mismatch: {0:?}")]
    TokenScopeMismatch(ScopeMismatchReason),

    #[error("token names an unknown node: {node_id}")]
    TokenUnknownNode { node_id: String },

    #[error("token workflow hash does not match run_started")]
    TokenWorkflowHashMismatch,

    #[error("session locked, retry after {after_ms}ms")]
    TokenSessionLocked { after_ms: u64 },
}

impl EngineError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Timeout => "TIMEOUT",
            EngineError::Internal(_) => "INTERNAL_ERROR",
            EngineError::SessionNotHealthy(_) => "SESSION_NOT_HEALTHY",
            EngineError::Token(inner) => inner.wire_code(),
            EngineError::TokenScopeMismatch(_) => "TOKEN_SCOPE_MISMATCH",
            EngineError::TokenUnknownNode { .. } => "TOKEN_UNKNOWN_NODE",
            EngineError::TokenWorkflowHashMismatch => "TOKEN_WORKFLOW_HASH_MISMATCH",
            EngineError::TokenSessionLocked { .. } => "TOKEN_SESSION_LOCKED",
        }
    }

    pub fn from_store_error(err: StoreError) -> Self {
        match err {
            StoreError::MissingSnapshot { snapshot_ref } => EngineError::Internal(format!(
                "Missing execution snapshot: {snapshot_ref}"
            )),
            StoreError::Corruption { .. } => EngineError::SessionNotHealthy(err.to_string()),
            other => EngineError::Internal(other.to_string()),
        }
    }

    pub fn from_provider_error(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { workflow_id } => {
                EngineError::NotFound(format!("workflow not found: {workflow_id}"))
            }
            ProviderError::Failed(msg) => EngineError::Internal(msg),
        }
    }

    pub fn from_advance_error(err: AdvanceError) -> Self {
        match err {
            AdvanceError::Failed(msg) => EngineError::Internal(msg),
        }
    }
}

/// Lift a gate failure into the engine's union. `SESSION_LOCKED` is
/// deliberately renamed `TOKEN_SESSION_LOCKED` here: the gate's own wire
/// code names the lock in isolation, but the closed outward set (spec
/// §6.3) only ever exposes lock contention in the token-flow shape.
impl From<GateError<EngineError>> for EngineError {
    fn from(err: GateError<EngineError>) -> Self {
        match err {
            GateError::SessionLocked { after_ms } => EngineError::TokenSessionLocked { after_ms },
            GateError::SessionLockReentrant => EngineError::TokenSessionLocked { after_ms: 0 },
            GateError::SessionNotHealthy { reason, .. } => EngineError::SessionNotHealthy(reason),
            GateError::SessionLoadFailed(inner) => EngineError::from_store_error(inner),
            GateError::LockAcquireFailed(LockError::Fs(fs_err)) => {
                EngineError::Internal(fs_err.to_string())
            }
            GateError::LockAcquireFailed(inner) => EngineError::Internal(inner.to_string()),
            GateError::LockReleaseFailed => {
                EngineError::Internal("failed to release session lock".to_string())
            }
            GateError::GateCallbackFailed(inner) => inner,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
