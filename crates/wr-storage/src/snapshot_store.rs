// SPDX-License-Identifier: MIT OR Apache-2.0

//! The content-addressed store for engine-state snapshots and pinned
//! workflow definitions (spec §3.4).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use wr_core::canonical::{sha256_hex, to_canonical_bytes};
use wr_core::event::WorkflowSource;
use wr_core::engine_state::EngineState;
use wr_fs::{DataDir, FsPort};

use crate::error::StoreError;

/// `execution_snapshot_v1` payload shape (spec §3.4).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnginePayload {
    pub v: u32,
    pub engine_state: EngineState,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionSnapshotV1 {
    pub v: u32,
    pub kind: String,
    pub engine_payload: EnginePayload,
}

impl ExecutionSnapshotV1 {
    pub fn new(engine_state: EngineState) -> Self {
        Self {
            v: 1,
            kind: "execution_snapshot".to_string(),
            engine_payload: EnginePayload {
                v: 1,
                engine_state,
            },
        }
    }
}

/// `pinned_workflow_v1` payload shape (spec §3.4): the workflow definition
/// as returned by the external `WorkflowProvider`, frozen for the run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PinnedWorkflowV1 {
    pub v: u32,
    pub kind: String,
    pub workflow_id: String,
    pub source: WorkflowSource,
    pub definition: serde_json::Value,
}

impl PinnedWorkflowV1 {
    pub fn new(workflow_id: String, source: WorkflowSource, definition: serde_json::Value) -> Self {
        Self {
            v: 1,
            kind: "pinned_workflow".to_string(),
            workflow_id,
            source,
            definition,
        }
    }
}

/// A content-addressed store rooted at a single base directory (either
/// `snapshots/` or `workflows/pinned/`).
pub struct SnapshotStore {
    fs: Arc<dyn FsPort>,
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn snapshots(fs: Arc<dyn FsPort>, data_dir: &DataDir) -> Self {
        Self {
            fs,
            base_dir: data_dir.snapshots_dir(),
        }
    }

    pub fn pinned_workflows(fs: Arc<dyn FsPort>, data_dir: &DataDir) -> Self {
        Self {
            fs,
            base_dir: data_dir.pinned_workflows_dir(),
        }
    }

    /// Write `value` content-addressed by the sha256 of its canonical
    /// bytes. Write-idempotent: if the target already exists, this is a
    /// no-op (spec §3.4, §5 "snapshot CAS is write-idempotent").
    pub fn put<T: Serialize>(&self, value: &T) -> Result<String, StoreError> {
        let hex_digest = sha256_hex(value)?;
        let path = DataDir::cas_path(&self.base_dir, &hex_digest);
        if !self.fs.exists(&path) {
            let bytes = to_canonical_bytes(value)?;
            self.fs.write_file_bytes(&path, &bytes)?;
        }
        Ok(format!("sha256:{hex_digest}"))
    }

    /// Read the value addressed by `snapshot_ref` (`sha256:<hex>`).
    ///
    /// Absence is reported as [`StoreError::MissingSnapshot`] so callers on
    /// the fact-returning replay path can fail closed per spec §4.5.4 /
    /// §8.1 invariant 3, rather than ever recomputing the outcome.
    pub fn get<T: DeserializeOwned>(&self, snapshot_ref: &str) -> Result<T, StoreError> {
        let hex_digest = snapshot_ref.strip_prefix("sha256:").unwrap_or(snapshot_ref);
        let path = DataDir::cas_path(&self.base_dir, hex_digest);
        if !self.fs.exists(&path) {
            return Err(StoreError::MissingSnapshot {
                snapshot_ref: snapshot_ref.to_string(),
            });
        }
        let bytes = self.fs.read_file_bytes(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
#[path = "snapshot_store_tests.rs"]
mod tests;
