// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable event types — the source of truth for everything the
//! engine knows about a session (spec §3.2).

use crate::id::{AttemptId, EventId, NodeId, RunId, SessionId, WorkflowHash};
use serde::{Deserialize, Serialize};

/// Scope narrows an event to a run, and optionally a node within that run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

/// Where a pinned workflow definition was fetched from — carried on
/// `run_started` for audit purposes. The fetch itself is performed by an
/// external `WorkflowProvider` (see `wr-engine::workflow`); this type only
/// records which collaborator answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowSource {
    Filesystem { path: String },
    Git { repo: String, reference: String },
    Http { url: String },
    Plugin { name: String },
}

/// Kind of node materialized in a run's DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Step,
    BlockedAttempt,
}

/// Kind of edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Advance,
}

/// Why an edge was created — the fork-detection tag (spec §4.5.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCause {
    IdempotentReplay,
    IntentionalFork,
    NonTipAdvance,
}

/// Channel an appended node output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputChannel {
    Recap,
    Artifact,
}

/// The intent that produced an `advance_recorded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceIntent {
    Advance,
}

/// The terminal outcome of an advance attempt — closed, per spec §3.2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced { to_node_id: NodeId },
    Blocked { to_node_id: NodeId },
    Completed,
    Unchanged,
}

/// Autonomy / risk preference scalars set on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub autonomy: String,
    pub risk_policy: String,
}

/// A single appended output (recap or artifact) of an advance attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPayload {
    pub content_type: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// The closed set of event kinds (spec §3.2 table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "session_created")]
    SessionCreated,

    #[serde(rename = "run_started")]
    RunStarted {
        workflow_id: String,
        workflow_hash: WorkflowHash,
        source: WorkflowSource,
    },

    #[serde(rename = "node_created")]
    NodeCreated {
        node_id: NodeId,
        node_kind: NodeKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_node_id: Option<NodeId>,
        workflow_hash: WorkflowHash,
        snapshot_ref: String,
    },

    #[serde(rename = "edge_created")]
    EdgeCreated {
        edge_kind: EdgeKind,
        from_node_id: NodeId,
        to_node_id: NodeId,
        cause: EdgeCause,
    },

    #[serde(rename = "node_output_appended")]
    NodeOutputAppended {
        output_id: String,
        output_channel: OutputChannel,
        payload: OutputPayload,
    },

    #[serde(rename = "advance_recorded")]
    AdvanceRecorded {
        attempt_id: AttemptId,
        intent: AdvanceIntent,
        outcome: AdvanceOutcome,
    },

    #[serde(rename = "preference_set")]
    PreferenceSet {
        #[serde(flatten)]
        preferences: Preferences,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SessionCreated => "session_created",
            EventKind::RunStarted { .. } => "run_started",
            EventKind::NodeCreated { .. } => "node_created",
            EventKind::EdgeCreated { .. } => "edge_created",
            EventKind::NodeOutputAppended { .. } => "node_output_appended",
            EventKind::AdvanceRecorded { .. } => "advance_recorded",
            EventKind::PreferenceSet { .. } => "preference_set",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            EventKind::SessionCreated => t.to_string(),
            EventKind::RunStarted {
                workflow_id,
                workflow_hash,
                ..
            } => format!(
                "{t} workflow={workflow_id} hash={}",
                workflow_hash.short_ref()
            ),
            EventKind::NodeCreated {
                node_id,
                node_kind,
                parent_node_id,
                ..
            } => match parent_node_id {
                Some(parent) => format!("{t} node={node_id} kind={node_kind:?} parent={parent}"),
                None => format!("{t} node={node_id} kind={node_kind:?} parent=none"),
            },
            EventKind::EdgeCreated {
                from_node_id,
                to_node_id,
                cause,
                ..
            } => format!("{t} from={from_node_id} to={to_node_id} cause={cause:?}"),
            EventKind::NodeOutputAppended {
                output_id,
                output_channel,
                ..
            } => format!("{t} output={output_id} channel={output_channel:?}"),
            EventKind::AdvanceRecorded {
                attempt_id,
                outcome,
                ..
            } => format!("{t} attempt={attempt_id} outcome={outcome:?}"),
            EventKind::PreferenceSet { preferences } => {
                format!(
                    "{t} autonomy={} risk={}",
                    preferences.autonomy, preferences.risk_policy
                )
            }
        }
    }
}

/// Schema version of the event envelope. Bumping this is a breaking change
/// to the on-disk format (spec §9: "idempotency keys are load-bearing").
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// A single durable event, as stored in a session's event log (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_index: u64,
    pub event_id: EventId,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub dedupe_key: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl EventEnvelope {
    /// Build the dedupe key for an `advance_recorded` event (spec §4.5.4).
    /// This formula is part of the public on-disk contract.
    pub fn advance_recorded_dedupe_key(
        session_id: &SessionId,
        node_id: &NodeId,
        attempt_id: &AttemptId,
    ) -> String {
        format!("advance_recorded:{session_id}:{node_id}:{attempt_id}")
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
