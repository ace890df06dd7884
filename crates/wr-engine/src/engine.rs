// SPDX-License-Identifier: MIT OR Apache-2.0

//! Constructor wiring for the start/continue state machine: every
//! collaborator `start_workflow` and `continue_workflow` depend on,
//! bundled behind explicit constructor injection rather than any global
//! singleton (spec §9: "No shared mutable state").

use std::sync::Arc;

use wr_core::IdGen;
use wr_session::ExecutionSessionGate;
use wr_storage::{EventLogStore, SnapshotStore};
use wr_token::Keyring;

use crate::workflow::{Advance, WorkflowProvider};

/// Everything `start_workflow`/`continue_workflow` need, wired once at
/// startup and shared behind `Arc` across concurrent tool calls.
pub struct Engine {
    pub gate: Arc<ExecutionSessionGate>,
    pub event_log: Arc<EventLogStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub pinned_workflows: Arc<SnapshotStore>,
    pub keyring: Arc<Keyring>,
    pub provider: Arc<dyn WorkflowProvider>,
    pub advancer: Arc<dyn Advance>,
    pub id_gen: Arc<dyn IdGen>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: Arc<ExecutionSessionGate>,
        event_log: Arc<EventLogStore>,
        snapshots: Arc<SnapshotStore>,
        pinned_workflows: Arc<SnapshotStore>,
        keyring: Arc<Keyring>,
        provider: Arc<dyn WorkflowProvider>,
        advancer: Arc<dyn Advance>,
        id_gen: Arc<dyn IdGen>,
    ) -> Self {
        Self {
            gate,
            event_log,
            snapshots,
            pinned_workflows,
            keyring,
            provider,
            advancer,
            id_gen,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::sync::Arc;

    use wr_core::{SequentialIdGen, SystemClock};
    use wr_fs::{DataDir, RealFs};
    use wr_session::SessionLock;

    use crate::workflow::test_support::{FakeWorkflowProvider, SingleStepAdvance};

    /// Wire a fully in-memory-backed `Engine` rooted at `root`, suitable
    /// for tests that need the whole stack without a real interpreter.
    pub fn test_engine(root: &std::path::Path) -> (Engine, Arc<FakeWorkflowProvider>) {
        let fs: Arc<dyn wr_fs::FsPort> = Arc::new(RealFs);
        let data_dir = DataDir::at(root.to_path_buf());
        let event_log = Arc::new(EventLogStore::new(Arc::clone(&fs), data_dir.clone()));
        let lock = Arc::new(SessionLock::new(
            Arc::clone(&fs),
            data_dir.clone(),
            Arc::new(SystemClock),
            chrono::Duration::seconds(30),
            std::process::id(),
            "test-host",
        ));
        let gate = Arc::new(ExecutionSessionGate::new(lock, Arc::clone(&event_log)));
        let snapshots = Arc::new(SnapshotStore::snapshots(Arc::clone(&fs), &data_dir));
        let pinned_workflows = Arc::new(SnapshotStore::pinned_workflows(Arc::clone(&fs), &data_dir));
        let keyring = Arc::new(Keyring::load_or_create(Arc::clone(&fs), &data_dir).unwrap());
        let provider = Arc::new(FakeWorkflowProvider::new());
        let advancer = Arc::new(SingleStepAdvance);
        let id_gen = Arc::new(SequentialIdGen::new("id"));

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
        (engine, provider)
    }
}
