// SPDX-License-Identifier: MIT OR Apache-2.0

//! Constructs a real `Engine` rooted at a data directory on disk.
//!
//! The workflow provider and advancer are the engine's `test_support`
//! fakes (see `wr-engine`'s `Advance`/`WorkflowProvider` docs): a real
//! interpreter and workflow loader are external collaborators the core
//! never ships.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use wr_core::{SequentialIdGen, SystemClock};
use wr_engine::workflow::test_support::{FakeWorkflowProvider, SingleStepAdvance};
use wr_engine::workflow::{WorkflowDef, WorkflowProvider};
use wr_engine::Engine;
use wr_fs::{DataDir, RealFs};
use wr_session::{ExecutionSessionGate, SessionLock};
use wr_storage::{EventLogStore, SnapshotStore};
use wr_token::Keyring;

const LOCK_TTL_SECONDS: i64 = 30;

pub fn wire(root: &Path) -> Result<(Engine, Arc<FakeWorkflowProvider>)> {
    let fs: Arc<dyn wr_fs::FsPort> = Arc::new(RealFs);
    let data_dir = DataDir::at(root.to_path_buf());

    let event_log = Arc::new(EventLogStore::new(Arc::clone(&fs), data_dir.clone()));
    let lock = Arc::new(SessionLock::new(
        Arc::clone(&fs),
        data_dir.clone(),
        Arc::new(SystemClock),
        chrono::Duration::seconds(LOCK_TTL_SECONDS),
        std::process::id(),
        hostname(),
    ));
    let gate = Arc::new(ExecutionSessionGate::new(lock, Arc::clone(&event_log)));
    let snapshots = Arc::new(SnapshotStore::snapshots(Arc::clone(&fs), &data_dir));
    let pinned_workflows = Arc::new(SnapshotStore::pinned_workflows(Arc::clone(&fs), &data_dir));
    let keyring = Arc::new(
        Keyring::load_or_create(Arc::clone(&fs), &data_dir)
            .context("failed to load or create the token signing keyring")?,
    );
    let provider = Arc::new(FakeWorkflowProvider::new());
    let advancer = Arc::new(SingleStepAdvance);
    let id_gen = Arc::new(SequentialIdGen::new("wr"));

    let engine = Engine::new(
        gate,
        event_log,
        snapshots,
        pinned_workflows,
        keyring,
        provider.clone(),
        advancer,
        id_gen,
    );
    Ok((engine, provider))
}

/// Installs a single-step demo workflow under `workflow_id` if the fake
/// provider doesn't already know it, so `wr start <id>` works out of the
/// box with no separately-loaded workflow source.
pub fn ensure_demo_workflow(provider: &FakeWorkflowProvider, workflow_id: &str) {
    if provider.fetch_by_id(workflow_id).is_ok() {
        return;
    }
    provider.insert(WorkflowDef {
        workflow_id: workflow_id.to_string(),
        source: wr_core::event::WorkflowSource::Filesystem {
            path: format!("demo:{workflow_id}"),
        },
        definition: serde_json::json!({
            "firstStep": "step-1",
            "steps": {
                "step-1": {
                    "title": "Demo step",
                    "prompt": "This workflow has no interpreter behind it yet.",
                    "requireConfirmation": false
                }
            }
        }),
    });
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
