// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-session advisory lock (spec §4.2).
//!
//! Persisted as an exclusive-create file so acquisition is atomic even
//! across processes sharing a data directory. Liveness of a lock's
//! current owner can only be judged by age against a TTL here: checking
//! whether a pid is still running on its recorded host would need an
//! `unsafe` syscall, which the workspace forbids, so a lock is "stale"
//! purely once it is older than `ttl`, never by probing the owning
//! process.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use wr_core::{Clock, SessionId};
use wr_fs::{DataDir, FsPort};

use crate::error::LockError;

/// The lock file's on-disk contents (spec §4.2.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockContents {
    pub owner_pid: u32,
    pub owner_host: String,
    pub acquired_at: DateTime<Utc>,
}

/// Held by a successful `acquire`; pass to `release`.
#[derive(Debug)]
pub struct LockHandle {
    session_id: SessionId,
}

impl LockHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}

/// The per-session lock manager (spec §4.2).
pub struct SessionLock {
    fs: Arc<dyn FsPort>,
    data_dir: DataDir,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    pid: u32,
    host: String,
    held: Mutex<HashSet<SessionId>>,
}

impl SessionLock {
    pub fn new(
        fs: Arc<dyn FsPort>,
        data_dir: DataDir,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        pid: u32,
        host: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            data_dir,
            clock,
            ttl,
            pid,
            host: host.into(),
            held: Mutex::new(HashSet::new()),
        }
    }

    /// `acquire(sessionId) -> handle | SESSION_LOCK_BUSY` (spec §4.2).
    pub fn acquire(&self, session_id: &SessionId) -> Result<LockHandle, LockError> {
        {
            let mut held = self.held.lock();
            if held.contains(session_id) {
                return Err(LockError::Reentrant);
            }
            // Reserve the slot before touching disk so two threads in this
            // same process racing for the same session both see the
            // reservation rather than both reaching the filesystem.
            held.insert(session_id.clone());
        }

        match self.try_create_lock_file(session_id) {
            Ok(()) => Ok(LockHandle {
                session_id: session_id.clone(),
            }),
            Err(err) => {
                self.held.lock().remove(session_id);
                Err(err)
            }
        }
    }

    /// `release(handle)` is infallible (spec §4.2).
    pub fn release(&self, handle: LockHandle) {
        let lock_path = self.data_dir.session_lock_path(handle.session_id.as_str());
        let _ = self.fs.unlink(&lock_path);
        self.held.lock().remove(&handle.session_id);
    }

    fn try_create_lock_file(&self, session_id: &SessionId) -> Result<(), LockError> {
        let lock_path = self.data_dir.session_lock_path(session_id.as_str());
        let contents = self.lock_contents_bytes()?;

        match self.fs.open_exclusive(&lock_path, &contents) {
            Ok(()) => return Ok(()),
            Err(err) if err.code() == "FS_EXISTS" => {}
            Err(err) => return Err(LockError::Fs(err)),
        }

        self.reclaim_if_stale(&lock_path)
    }

    fn lock_contents_bytes(&self) -> Result<Vec<u8>, LockError> {
        let contents = LockContents {
            owner_pid: self.pid,
            owner_host: self.host.clone(),
            acquired_at: self.clock.now(),
        };
        Ok(serde_json::to_vec(&contents)?)
    }

    fn reclaim_if_stale(&self, lock_path: &Path) -> Result<(), LockError> {
        let existing_bytes = self.fs.read_file_bytes(lock_path)?;
        let existing: LockContents =
            serde_json::from_slice(&existing_bytes).map_err(|_| LockError::Corrupt)?;

        let age = self.clock.now() - existing.acquired_at;
        if age < self.ttl {
            let after_ms = (self.ttl - age).num_milliseconds().max(0) as u64;
            return Err(LockError::Busy { after_ms });
        }

        // Replace-with-ownership: write our claim to a temp file and
        // atomically rename it over the stale lock, mirroring the same
        // temp-file-then-rename idiom used by every durable write in this
        // tree rather than an unlink-then-create race.
        let tmp_path = lock_path.with_extension("reclaim.tmp");
        let contents = self.lock_contents_bytes()?;
        self.fs.write_file_bytes(&tmp_path, &contents)?;
        self.fs.rename(&tmp_path, lock_path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
