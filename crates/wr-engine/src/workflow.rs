// SPDX-License-Identifier: MIT OR Apache-2.0

//! The two external collaborator contracts the state machine is built
//! against (spec §1 "explicitly out of scope", SPEC_FULL §4.5.6): a
//! workflow source loader and a workflow interpreter. Neither is
//! implemented here; `test_support` ships a fake of each so the state
//! machine's own tests don't depend on a real interpreter.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wr_core::engine_state::EngineState;
use wr_core::event::WorkflowSource;

/// A resolved workflow definition, opaque to the engine beyond its id,
/// source, and a step table the engine reads to render pending-step
/// display metadata without invoking the interpreter (title/prompt are
/// static; only control flow needs `Advance`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub workflow_id: String,
    pub source: WorkflowSource,
    pub definition: serde_json::Value,
}

impl WorkflowDef {
    /// The id of the workflow's first step, read from
    /// `definition.firstStep`.
    pub fn first_step(&self) -> Option<&str> {
        self.definition.get("firstStep")?.as_str()
    }

    /// Display metadata for `step_id`, read from `definition.steps[step_id]`.
    pub fn step_view(&self, step_id: &str) -> Option<StepView> {
        let step = self.definition.get("steps")?.get(step_id)?;
        Some(StepView {
            step_id: step_id.to_string(),
            title: step.get("title")?.as_str()?.to_string(),
            prompt: step.get("prompt")?.as_str()?.to_string(),
            require_confirmation: step
                .get("requireConfirmation")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }
}

/// Display metadata for a pending step, as surfaced in a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepView {
    pub step_id: String,
    pub title: String,
    pub prompt: String,
    pub require_confirmation: bool,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("workflow not found: {workflow_id}")]
    NotFound { workflow_id: String },
    #[error("workflow provider failed: {0}")]
    Failed(String),
}

/// Resolves a workflow id to its definition (spec §4.5.1 step 1).
pub trait WorkflowProvider: Send + Sync {
    fn fetch_by_id(&self, workflow_id: &str) -> Result<WorkflowDef, ProviderError>;
}

/// Free-form input handed to the interpreter on an advance attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvanceInput {
    #[serde(default)]
    pub context: serde_json::Value,
}

/// What the interpreter produced for one advance attempt (spec §4.5.4
/// step 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub next_state: EngineState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recap_markdown: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactOutput>,
    #[serde(default)]
    pub blockers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactOutput {
    pub content_type: String,
    pub body: String,
    pub sha256: String,
}

#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error("interpreter failed: {0}")]
    Failed(String),
}

/// Pure interpreter contract: given a workflow and the current state, what
/// comes next (spec §1, SPEC_FULL §4.5.6).
pub trait Advance: Send + Sync {
    fn advance(
        &self,
        workflow: &WorkflowDef,
        state: &EngineState,
        input: &AdvanceInput,
    ) -> Result<AdvanceOutcome, AdvanceError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A fake `WorkflowProvider` backed by an in-memory map, grounded on
    /// the teacher's pattern of shipping a fake collaborator alongside a
    /// real contract for its own tests.
    #[derive(Default)]
    pub struct FakeWorkflowProvider {
        workflows: Mutex<HashMap<String, WorkflowDef>>,
    }

    impl FakeWorkflowProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, workflow: WorkflowDef) {
            self.workflows
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(workflow.workflow_id.clone(), workflow);
        }
    }

    impl WorkflowProvider for FakeWorkflowProvider {
        fn fetch_by_id(&self, workflow_id: &str) -> Result<WorkflowDef, ProviderError> {
            self.workflows
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(workflow_id)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound {
                    workflow_id: workflow_id.to_string(),
                })
        }
    }

    /// A fake `Advance` that always completes after one step, used by
    /// tests that only need to exercise the state machine's bookkeeping.
    pub struct SingleStepAdvance;

    impl Advance for SingleStepAdvance {
        fn advance(
            &self,
            _workflow: &WorkflowDef,
            _state: &EngineState,
            _input: &AdvanceInput,
        ) -> Result<AdvanceOutcome, AdvanceError> {
            Ok(AdvanceOutcome {
                next_state: EngineState::Complete,
                recap_markdown: Some("done".to_string()),
                artifacts: Vec::new(),
                blockers: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
