// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution session gate (spec §4.4): the only way the rest of the
//! tree is allowed to append to a session's event log.

use std::sync::Arc;

use wr_core::SessionId;
use wr_storage::{EventLogStore, LoadResult, Witness};

use crate::error::GateError;
use crate::lock::SessionLock;

/// Combines the session lock with a health check and hands the callback a
/// witness scoped to the critical section (spec §4.4).
pub struct ExecutionSessionGate {
    lock: Arc<SessionLock>,
    store: Arc<EventLogStore>,
}

impl ExecutionSessionGate {
    pub fn new(lock: Arc<SessionLock>, store: Arc<EventLogStore>) -> Self {
        Self { lock, store }
    }

    /// `gate.with_healthy_session_lock(sessionId, f)` (spec §4.4):
    /// 1. Acquire the lock, surfacing contention as `SESSION_LOCKED`.
    /// 2. Load the event log head; an integrity failure becomes
    ///    `SESSION_NOT_HEALTHY` and releases the lock immediately.
    /// 3. Mint a witness scoped to this call and invoke `f`.
    /// 4. Release the lock on every exit path.
    pub fn with_healthy_session_lock<T, E, F>(
        &self,
        session_id: &SessionId,
        f: F,
    ) -> Result<T, GateError<E>>
    where
        E: std::fmt::Debug + std::fmt::Display,
        F: FnOnce(&Witness<'_>, &LoadResult) -> Result<T, E>,
    {
        let handle = match self.lock.acquire(session_id) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(session_id = %session_id, "session lock contended");
                return Err(GateError::from_lock_error(err));
            }
        };

        let loaded = match self.store.load(session_id) {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "session failed health check on load");
                self.lock.release(handle);
                return Err(GateError::from_load_error(err));
            }
        };

        let (witness, release) = Witness::mint(session_id.clone());
        let outcome = f(&witness, &loaded);
        release.release();
        self.lock.release(handle);

        outcome.map_err(GateError::GateCallbackFailed)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
