// SPDX-License-Identifier: MIT OR Apache-2.0

//! `start_workflow` (spec §4.5.1).

use std::collections::BTreeSet;

use wr_core::canonical::to_canonical_bytes;
use wr_core::engine_state::EngineState;
use wr_core::event::{EventEnvelope, EventKind, NodeKind, Scope};
use wr_core::{AttemptId, EventId, IdGen, NodeId, RunId, SessionId, WorkflowHash};
use wr_storage::{AppendRequest, ExecutionSnapshotV1, PinnedWorkflowV1, SnapshotPin};
use wr_token::{encode_ack_token, encode_state_token, AckTokenPayload, StateTokenPayload};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::response::{NextCall, PendingStep, PreferencesView, WorkflowResponse};

/// Maximum size, in canonical bytes, of the `context` blob a caller may
/// pass to `start_workflow` (spec §4.5.1: "budget-checked against a
/// configured max byte size").
pub const MAX_CONTEXT_BYTES: usize = 64 * 1024;

pub fn start_workflow(
    engine: &Engine,
    workflow_id: &str,
    context: serde_json::Value,
) -> Result<WorkflowResponse, EngineError> {
    let context_bytes = to_canonical_bytes(&context)
        .map_err(|e| EngineError::Validation(format!("context is not serializable: {e}")))?;
    if context_bytes.len() > MAX_CONTEXT_BYTES {
        return Err(EngineError::Validation(format!(
            "context exceeds the maximum of {MAX_CONTEXT_BYTES} bytes"
        )));
    }

    let workflow_def = engine
        .provider
        .fetch_by_id(workflow_id)
        .map_err(EngineError::from_provider_error)?;

    let pinned = PinnedWorkflowV1::new(
        workflow_def.workflow_id.clone(),
        workflow_def.source.clone(),
        workflow_def.definition.clone(),
    );
    let pinned_bytes = to_canonical_bytes(&pinned)
        .map_err(|e| EngineError::Internal(format!("failed to hash pinned workflow: {e}")))?;
    let workflow_hash = WorkflowHash::of_canonical_bytes(&pinned_bytes);
    engine
        .pinned_workflows
        .put(&pinned)
        .map_err(EngineError::from_store_error)?;

    let first_step = workflow_def
        .first_step()
        .ok_or_else(|| EngineError::Validation(format!("workflow {workflow_id} has no firstStep")))?
        .to_string();
    let step_view = workflow_def.step_view(&first_step).ok_or_else(|| {
        EngineError::Internal(format!("workflow {workflow_id} is missing step '{first_step}'"))
    })?;

    let initial_state = EngineState::Running {
        completed: BTreeSet::new(),
        loop_stack: Vec::new(),
        pending: first_step,
    };
    let snapshot = ExecutionSnapshotV1::new(initial_state);
    let snapshot_ref = engine
        .snapshots
        .put(&snapshot)
        .map_err(EngineError::from_store_error)?;

    let session_id = SessionId::new(engine.id_gen.next());
    let run_id = RunId::new(engine.id_gen.next());
    let node_id = NodeId::new(engine.id_gen.next());
    let attempt_id = AttemptId::new(engine.id_gen.next());
    let session_event_id = EventId::new(engine.id_gen.next());
    let run_event_id = EventId::new(engine.id_gen.next());
    let node_event_id = EventId::new(engine.id_gen.next());

    engine
        .gate
        .with_healthy_session_lock(&session_id, |witness, loaded| {
            let base_index = loaded.next_event_index();

            let session_created = EventEnvelope {
                v: wr_core::EVENT_SCHEMA_VERSION,
                event_index: base_index,
                event_id: session_event_id.clone(),
                session_id: session_id.clone(),
                scope: None,
                dedupe_key: format!("session_created:{session_id}"),
                kind: EventKind::SessionCreated,
            };
            let run_started = EventEnvelope {
                v: wr_core::EVENT_SCHEMA_VERSION,
                event_index: base_index + 1,
                event_id: run_event_id.clone(),
                session_id: session_id.clone(),
                scope: Some(Scope {
                    run_id: run_id.clone(),
                    node_id: None,
                }),
                dedupe_key: format!("run_started:{session_id}:{run_id}"),
                kind: EventKind::RunStarted {
                    workflow_id: workflow_def.workflow_id.clone(),
                    workflow_hash: workflow_hash.clone(),
                    source: workflow_def.source.clone(),
                },
            };
            let node_created = EventEnvelope {
                v: wr_core::EVENT_SCHEMA_VERSION,
                event_index: base_index + 2,
                event_id: node_event_id.clone(),
                session_id: session_id.clone(),
                scope: Some(Scope {
                    run_id: run_id.clone(),
                    node_id: None,
                }),
                dedupe_key: format!("node_created:{session_id}:{node_id}"),
                kind: EventKind::NodeCreated {
                    node_id: node_id.clone(),
                    node_kind: NodeKind::Step,
                    parent_node_id: None,
                    workflow_hash: workflow_hash.clone(),
                    snapshot_ref: snapshot_ref.clone(),
                },
            };

            engine
                .event_log
                .append(
                    witness,
                    AppendRequest {
                        events: vec![session_created, run_started, node_created],
                        snapshot_pins: vec![SnapshotPin {
                            snapshot_ref: snapshot_ref.clone(),
                            event_index: base_index + 2,
                            created_by_event_id: node_event_id.clone(),
                        }],
                    },
                )
                .map_err(EngineError::from_store_error)
        })?;

    tracing::info!(
        session_id = %session_id,
        run_id = %run_id,
        workflow_id = %workflow_def.workflow_id,
        "workflow started"
    );

    let state_token = encode_state_token(
        &StateTokenPayload {
            v: 1,
            session_id: session_id.clone(),
            run_id: run_id.clone(),
            node_id: node_id.clone(),
            workflow_hash_ref: workflow_hash.short_ref(),
        },
        &engine.keyring,
    )?;
    let ack_token = encode_ack_token(
        &AckTokenPayload {
            v: 1,
            session_id,
            run_id,
            node_id,
            attempt_id,
        },
        &engine.keyring,
    )?;

    Ok(WorkflowResponse {
        state_token,
        ack_token,
        pending: Some(PendingStep::from(step_view)),
        is_complete: false,
        next_intent: "advance".to_string(),
        next_call: Some(NextCall {
            tool: "continue_workflow".to_string(),
            intent: "advance".to_string(),
        }),
        preferences: PreferencesView::default(),
    })
}

#[cfg(test)]
#[path = "start_tests.rs"]
mod tests;
