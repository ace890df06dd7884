// SPDX-License-Identifier: MIT OR Apache-2.0

//! `continue_workflow` (spec §4.5.2-§4.5.4) and `resume_session`
//! (spec §6.2).

use wr_core::engine_state::{BlockedKind, EngineState};
use wr_core::event::{
    EdgeCause, EdgeKind, EventEnvelope, EventKind, NodeKind, OutputChannel, OutputPayload, Scope,
};
use wr_core::{AttemptId, EventId, IdGen, NodeId, RunId, SessionId};
use wr_storage::{AppendRequest, ExecutionSnapshotV1, LoadResult, PinnedWorkflowV1, SnapshotPin};
use wr_token::{
    decode_ack_token, decode_state_token, encode_ack_token, encode_state_token, AckTokenPayload,
    StateTokenPayload,
};

use crate::engine::Engine;
use crate::error::{EngineError, ScopeMismatchReason};
use crate::fork;
use crate::projections;
use crate::response::{NextCall, PendingStep, PreferencesView, ResumeCandidate, WorkflowResponse};
use crate::workflow::{AdvanceInput, WorkflowDef};

fn validate_scope(state: &StateTokenPayload, ack: &AckTokenPayload) -> Result<(), EngineError> {
    if state.session_id != ack.session_id {
        return Err(EngineError::TokenScopeMismatch(
            ScopeMismatchReason::StateAckSessionMismatch,
        ));
    }
    if state.run_id != ack.run_id {
        return Err(EngineError::TokenScopeMismatch(
            ScopeMismatchReason::StateAckRunMismatch,
        ));
    }
    if state.node_id != ack.node_id {
        return Err(EngineError::TokenScopeMismatch(
            ScopeMismatchReason::StateAckNodeMismatch,
        ));
    }
    Ok(())
}

fn check_workflow_hash(state: &StateTokenPayload, run_started: &projections::RunStarted) -> Result<(), EngineError> {
    if run_started.workflow_hash.short_ref() != state.workflow_hash_ref {
        return Err(EngineError::TokenWorkflowHashMismatch);
    }
    Ok(())
}

fn pending_and_completion(
    workflow_def: &WorkflowDef,
    state: &EngineState,
) -> (Option<PendingStep>, bool) {
    match state {
        EngineState::Running { pending, .. } => {
            (workflow_def.step_view(pending).map(PendingStep::from), false)
        }
        EngineState::Blocked { .. } => (None, false),
        EngineState::Complete => (None, true),
        EngineState::Init => (None, false),
    }
}

fn load_pinned_workflow(
    engine: &Engine,
    run_started: &projections::RunStarted,
) -> Result<WorkflowDef, EngineError> {
    let pinned: PinnedWorkflowV1 = engine
        .pinned_workflows
        .get(run_started.workflow_hash.as_str())
        .map_err(EngineError::from_store_error)?;
    Ok(WorkflowDef {
        workflow_id: pinned.workflow_id,
        source: pinned.source,
        definition: pinned.definition,
    })
}

/// Render the response naming `node` as the caller's current point in the
/// run: load its snapshot, render pending metadata, mint fresh tokens
/// (spec §4.5.2 rehydrate, §4.5.4 step 7 "render the response through the
/// replay path").
fn render_node(
    engine: &Engine,
    session_id: &SessionId,
    run_id: &RunId,
    run_started: &projections::RunStarted,
    node: &projections::NodeView,
) -> Result<WorkflowResponse, EngineError> {
    let snapshot: ExecutionSnapshotV1 = engine
        .snapshots
        .get(&node.snapshot_ref)
        .map_err(EngineError::from_store_error)?;
    let workflow_def = load_pinned_workflow(engine, run_started)?;

    let (pending, is_complete) =
        pending_and_completion(&workflow_def, &snapshot.engine_payload.engine_state);

    let state_token = encode_state_token(
        &StateTokenPayload {
            v: 1,
            session_id: session_id.clone(),
            run_id: run_id.clone(),
            node_id: node.node_id.clone(),
            workflow_hash_ref: run_started.workflow_hash.short_ref(),
        },
        &engine.keyring,
    )?;
    let ack_token = encode_ack_token(
        &AckTokenPayload {
            v: 1,
            session_id: session_id.clone(),
            run_id: run_id.clone(),
            node_id: node.node_id.clone(),
            attempt_id: AttemptId::new(engine.id_gen.next()),
        },
        &engine.keyring,
    )?;

    Ok(WorkflowResponse {
        state_token,
        ack_token,
        pending,
        is_complete,
        next_intent: if is_complete { "none".to_string() } else { "advance".to_string() },
        next_call: if is_complete {
            None
        } else {
            Some(NextCall {
                tool: "continue_workflow".to_string(),
                intent: "advance".to_string(),
            })
        },
        preferences: PreferencesView::default(),
    })
}

/// **rehydrate** (spec §4.5.2): side-effect-free, no events appended.
pub fn rehydrate(engine: &Engine, state_token: &str) -> Result<WorkflowResponse, EngineError> {
    let state = decode_state_token(state_token, &engine.keyring)?;
    let loaded = engine
        .event_log
        .load(&state.session_id)
        .map_err(EngineError::from_store_error)?;

    let run_started = projections::run_started(&loaded.events, &state.run_id).ok_or_else(|| {
        EngineError::TokenUnknownNode {
            node_id: state.node_id.as_str().to_string(),
        }
    })?;
    check_workflow_hash(&state, &run_started)?;

    let node = projections::find_node(&loaded.events, &state.node_id).ok_or_else(|| {
        EngineError::TokenUnknownNode {
            node_id: state.node_id.as_str().to_string(),
        }
    })?;

    tracing::debug!(session_id = %state.session_id, node_id = %state.node_id, "rehydrating");
    render_node(engine, &state.session_id, &state.run_id, &run_started, &node)
}

/// One `continue_workflow{advance}` call (spec §4.5.2, §4.5.3, §4.5.4).
pub struct AdvanceRequest {
    pub state_token: String,
    pub ack_token: String,
    pub input: AdvanceInput,
}

/// **advance** (spec §4.5.4): validate scope, then replay or compute
/// fresh, appending under the gate exactly once per distinct attempt.
pub fn advance(engine: &Engine, request: AdvanceRequest) -> Result<WorkflowResponse, EngineError> {
    let state = decode_state_token(&request.state_token, &engine.keyring)?;
    let ack = decode_ack_token(&request.ack_token, &engine.keyring)?;
    validate_scope(&state, &ack)?;

    let dedupe_key =
        EventEnvelope::advance_recorded_dedupe_key(&state.session_id, &state.node_id, &ack.attempt_id);

    let pre_check = engine
        .event_log
        .load(&state.session_id)
        .map_err(EngineError::from_store_error)?;

    if projections::advance_recorded(&pre_check.events, &dedupe_key).is_none() {
        engine
            .gate
            .with_healthy_session_lock(&state.session_id, |witness, loaded| {
                fresh_advance_if_needed(engine, witness, loaded, &state, &ack, &request.input, &dedupe_key)
            })?;
    } else {
        tracing::debug!(session_id = %state.session_id, attempt_id = %ack.attempt_id, "advance replay, no new events");
    }

    let final_loaded = engine
        .event_log
        .load(&state.session_id)
        .map_err(EngineError::from_store_error)?;
    render_replay(engine, &state, &final_loaded, &dedupe_key)
}

/// Render the response for an already-recorded `advance_recorded` event —
/// the fact-returning replay path shared by first-advance and re-advance
/// (spec §4.5.4 "Replay (fact-returning)").
fn render_replay(
    engine: &Engine,
    state: &StateTokenPayload,
    loaded: &LoadResult,
    dedupe_key: &str,
) -> Result<WorkflowResponse, EngineError> {
    let recorded = projections::advance_recorded(&loaded.events, dedupe_key).ok_or_else(|| {
        EngineError::Internal("advance_recorded event missing after append".to_string())
    })?;

    let run_started = projections::run_started(&loaded.events, &state.run_id).ok_or_else(|| {
        EngineError::Internal("run_started event missing for recorded run".to_string())
    })?;

    let outcome = match &recorded.kind {
        EventKind::AdvanceRecorded { outcome, .. } => outcome.clone(),
        _ => return Err(EngineError::Internal("expected advance_recorded event".to_string())),
    };

    match outcome {
        wr_core::event::AdvanceOutcome::Completed => Ok(WorkflowResponse {
            state_token: encode_state_token(
                &StateTokenPayload {
                    v: 1,
                    session_id: state.session_id.clone(),
                    run_id: state.run_id.clone(),
                    node_id: state.node_id.clone(),
                    workflow_hash_ref: state.workflow_hash_ref.clone(),
                },
                &engine.keyring,
            )?,
            ack_token: encode_ack_token(
                &AckTokenPayload {
                    v: 1,
                    session_id: state.session_id.clone(),
                    run_id: state.run_id.clone(),
                    node_id: state.node_id.clone(),
                    attempt_id: AttemptId::new(engine.id_gen.next()),
                },
                &engine.keyring,
            )?,
            pending: None,
            is_complete: true,
            next_intent: "none".to_string(),
            next_call: None,
            preferences: PreferencesView::default(),
        }),
        wr_core::event::AdvanceOutcome::Advanced { to_node_id }
        | wr_core::event::AdvanceOutcome::Blocked { to_node_id } => {
            let node = projections::find_node(&loaded.events, &to_node_id).ok_or_else(|| {
                EngineError::TokenUnknownNode {
                    node_id: to_node_id.as_str().to_string(),
                }
            })?;
            render_node(engine, &state.session_id, &state.run_id, &run_started, &node)
        }
        wr_core::event::AdvanceOutcome::Unchanged => {
            let node = projections::find_node(&loaded.events, &state.node_id).ok_or_else(|| {
                EngineError::TokenUnknownNode {
                    node_id: state.node_id.as_str().to_string(),
                }
            })?;
            render_node(engine, &state.session_id, &state.run_id, &run_started, &node)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fresh_advance_if_needed(
    engine: &Engine,
    witness: &wr_storage::Witness<'_>,
    loaded: &LoadResult,
    state: &StateTokenPayload,
    ack: &AckTokenPayload,
    input: &AdvanceInput,
    dedupe_key: &str,
) -> Result<(), EngineError> {
    if projections::advance_recorded(&loaded.events, dedupe_key).is_some() {
        return Ok(());
    }

    let source_node = projections::find_node(&loaded.events, &state.node_id).ok_or_else(|| {
        EngineError::TokenUnknownNode {
            node_id: state.node_id.as_str().to_string(),
        }
    })?;
    let snapshot: ExecutionSnapshotV1 = engine
        .snapshots
        .get(&source_node.snapshot_ref)
        .map_err(EngineError::from_store_error)?;
    let source_state = snapshot.engine_payload.engine_state;

    match (&source_node.node_kind, &source_state) {
        (NodeKind::Step, EngineState::Running { .. }) => {}
        (NodeKind::BlockedAttempt, EngineState::Blocked { blocked: BlockedKind::RetryableBlock { .. }, .. }) => {}
        (NodeKind::BlockedAttempt, EngineState::Blocked { blocked: BlockedKind::TerminalBlock, .. }) => {
            return Err(EngineError::TokenScopeMismatch(
                ScopeMismatchReason::TerminalBlockCannotBeRetried,
            ));
        }
        _ => {
            return Err(EngineError::Internal(
                "node kind and engine state disagree on advanceability".to_string(),
            ))
        }
    }

    let run_started = projections::run_started(&loaded.events, &state.run_id).ok_or_else(|| {
        EngineError::Internal("run_started event missing for advancing run".to_string())
    })?;
    let workflow_def = load_pinned_workflow(engine, &run_started)?;

    let outcome = engine
        .advancer
        .advance(&workflow_def, &source_state, input)
        .map_err(EngineError::from_advance_error)?;

    let base_index = loaded.next_event_index();
    let mut next_index = base_index;
    let mut events = Vec::new();
    let mut snapshot_pins = Vec::new();

    let recorded_outcome = match outcome.next_state {
        EngineState::Complete => wr_core::event::AdvanceOutcome::Completed,
        running_state @ EngineState::Running { .. } => {
            let to_node_id = NodeId::new(engine.id_gen.next());
            let child_snapshot = ExecutionSnapshotV1::new(running_state);
            let snapshot_ref = engine
                .snapshots
                .put(&child_snapshot)
                .map_err(EngineError::from_store_error)?;

            push_new_node_and_edge(
                engine,
                state,
                &source_node.node_id,
                &to_node_id,
                NodeKind::Step,
                &snapshot_ref,
                loaded,
                &mut events,
                &mut next_index,
                &mut snapshot_pins,
            )?;
            wr_core::event::AdvanceOutcome::Advanced { to_node_id }
        }
        EngineState::Blocked { blocked, blockers, primary_reason } => {
            let deterministic_blocked = match blocked {
                BlockedKind::RetryableBlock { .. } => BlockedKind::RetryableBlock {
                    retry_attempt_id: EngineState::derive_retry_attempt_id(&ack.attempt_id),
                },
                BlockedKind::TerminalBlock => BlockedKind::TerminalBlock,
            };
            let blocked_state = EngineState::Blocked {
                blocked: deterministic_blocked,
                blockers,
                primary_reason,
            };
            let to_node_id = NodeId::new(engine.id_gen.next());
            let child_snapshot = ExecutionSnapshotV1::new(blocked_state);
            let snapshot_ref = engine
                .snapshots
                .put(&child_snapshot)
                .map_err(EngineError::from_store_error)?;

            push_new_node_and_edge(
                engine,
                state,
                &source_node.node_id,
                &to_node_id,
                NodeKind::BlockedAttempt,
                &snapshot_ref,
                loaded,
                &mut events,
                &mut next_index,
                &mut snapshot_pins,
            )?;
            wr_core::event::AdvanceOutcome::Blocked { to_node_id }
        }
        EngineState::Init => {
            return Err(EngineError::Internal(
                "interpreter returned init, which is never a valid advance target".to_string(),
            ))
        }
    };

    let mut output_index = 0usize;
    if let Some(recap) = outcome.recap_markdown {
        events.push(output_event(
            state,
            &source_node.node_id,
            &ack.attempt_id,
            output_index,
            OutputChannel::Recap,
            OutputPayload {
                content_type: "text/markdown".to_string(),
                body: recap,
                sha256: None,
            },
            next_index,
        ));
        next_index += 1;
        output_index += 1;
    }
    let mut artifacts = outcome.artifacts;
    artifacts.sort_by(|a, b| a.sha256.cmp(&b.sha256));
    for artifact in artifacts {
        events.push(output_event(
            state,
            &source_node.node_id,
            &ack.attempt_id,
            output_index,
            OutputChannel::Artifact,
            OutputPayload {
                content_type: artifact.content_type,
                body: artifact.body,
                sha256: Some(artifact.sha256),
            },
            next_index,
        ));
        next_index += 1;
        output_index += 1;
    }

    events.push(EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: next_index,
        event_id: EventId::new(engine.id_gen.next()),
        session_id: state.session_id.clone(),
        scope: Some(Scope {
            run_id: state.run_id.clone(),
            node_id: Some(source_node.node_id.clone()),
        }),
        dedupe_key: dedupe_key.to_string(),
        kind: EventKind::AdvanceRecorded {
            attempt_id: ack.attempt_id.clone(),
            intent: wr_core::event::AdvanceIntent::Advance,
            outcome: recorded_outcome,
        },
    });

    engine
        .event_log
        .append(
            witness,
            AppendRequest {
                events,
                snapshot_pins,
            },
        )
        .map_err(EngineError::from_store_error)?;

    tracing::info!(
        session_id = %state.session_id,
        node_id = %source_node.node_id,
        attempt_id = %ack.attempt_id,
        outcome = ?recorded_outcome,
        "advance recorded"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn push_new_node_and_edge(
    engine: &Engine,
    state: &StateTokenPayload,
    source_node_id: &NodeId,
    to_node_id: &NodeId,
    node_kind: NodeKind,
    snapshot_ref: &str,
    loaded: &LoadResult,
    events: &mut Vec<EventEnvelope>,
    next_index: &mut u64,
    snapshot_pins: &mut Vec<SnapshotPin>,
) -> Result<(), EngineError> {
    let run_started = projections::run_started(&loaded.events, &state.run_id)
        .ok_or_else(|| EngineError::Internal("run_started missing".to_string()))?;

    let node_event_id = EventId::new(engine.id_gen.next());
    events.push(EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: *next_index,
        event_id: node_event_id.clone(),
        session_id: state.session_id.clone(),
        scope: Some(Scope {
            run_id: state.run_id.clone(),
            node_id: None,
        }),
        dedupe_key: format!("node_created:{}:{}", state.session_id, to_node_id),
        kind: EventKind::NodeCreated {
            node_id: to_node_id.clone(),
            node_kind,
            parent_node_id: Some(source_node_id.clone()),
            workflow_hash: run_started.workflow_hash.clone(),
            snapshot_ref: snapshot_ref.to_string(),
        },
    });
    snapshot_pins.push(SnapshotPin {
        snapshot_ref: snapshot_ref.to_string(),
        event_index: *next_index,
        created_by_event_id: node_event_id,
    });
    *next_index += 1;

    let existing_causes: Vec<EdgeCause> = projections::forward_edges(&loaded.events, source_node_id)
        .into_iter()
        .map(|(_, cause)| cause)
        .collect();
    let cause = fork::cause_for_new_edge(&existing_causes);

    events.push(EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: *next_index,
        event_id: EventId::new(engine.id_gen.next()),
        session_id: state.session_id.clone(),
        scope: Some(Scope {
            run_id: state.run_id.clone(),
            node_id: Some(source_node_id.clone()),
        }),
        dedupe_key: format!("edge_created:{}:{}:{}", state.session_id, source_node_id, to_node_id),
        kind: EventKind::EdgeCreated {
            edge_kind: EdgeKind::Advance,
            from_node_id: source_node_id.clone(),
            to_node_id: to_node_id.clone(),
            cause,
        },
    });
    *next_index += 1;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn output_event(
    state: &StateTokenPayload,
    source_node_id: &NodeId,
    attempt_id: &AttemptId,
    index: usize,
    channel: OutputChannel,
    payload: OutputPayload,
    event_index: u64,
) -> EventEnvelope {
    EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index,
        event_id: EventId::new(format!("output:{attempt_id}:{index}")),
        session_id: state.session_id.clone(),
        scope: Some(Scope {
            run_id: state.run_id.clone(),
            node_id: Some(source_node_id.clone()),
        }),
        dedupe_key: format!("node_output_appended:{}:{}:{}", state.session_id, attempt_id, index),
        kind: EventKind::NodeOutputAppended {
            output_id: format!("{attempt_id}:{index}"),
            output_channel: channel,
            payload,
        },
    }
}

/// `resume_session` (spec §6.2): a bounded list of candidate tips across
/// every run in a session, each with a freshly-minted state token.
pub fn resume_session(
    engine: &Engine,
    session_id: &str,
    max_candidates: usize,
) -> Result<Vec<ResumeCandidate>, EngineError> {
    let session_id = SessionId::new(session_id);
    let loaded = engine
        .event_log
        .load(&session_id)
        .map_err(EngineError::from_store_error)?;

    let mut run_ids = std::collections::HashSet::new();
    for event in &loaded.events {
        if let EventKind::RunStarted { .. } = &event.kind {
            if let Some(scope) = &event.scope {
                run_ids.insert(scope.run_id.clone());
            }
        }
    }

    let mut candidates = Vec::new();
    'runs: for run_id in run_ids {
        let run_started = match projections::run_started(&loaded.events, &run_id) {
            Some(r) => r,
            None => continue,
        };
        for tip in projections::tips(&loaded.events, &run_id) {
            if candidates.len() >= max_candidates {
                break 'runs;
            }
            let node = match projections::find_node(&loaded.events, &tip) {
                Some(n) => n,
                None => continue,
            };
            let response = render_node(engine, &session_id, &run_id, &run_started, &node)?;
            candidates.push(ResumeCandidate {
                session_id: session_id.as_str().to_string(),
                run_id: run_id.as_str().to_string(),
                node_id: tip.as_str().to_string(),
                state_token: response.state_token,
                pending: response.pending,
            });
        }
    }

    tracing::debug!(session_id = %session_id, candidate_count = candidates.len(), "resume candidates collected");
    Ok(candidates)
}

#[cfg(test)]
#[path = "continue__tests.rs"]
mod tests;
