// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure functions over a loaded event log (spec §3.6). The run DAG is
//! never materialized as a separate structure; everything here is
//! recomputed from the event list on demand, same as the teacher
//! recomputes its job graph from the append-only job log.

use std::collections::{HashMap, HashSet};

use wr_core::event::{AdvanceIntent, EdgeCause, EventEnvelope, EventKind, NodeKind, Preferences};
use wr_core::{AttemptId, NodeId, RunId, WorkflowHash};

/// Everything recorded about a run's `run_started` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStarted {
    pub workflow_id: String,
    pub workflow_hash: WorkflowHash,
}

/// Find the `run_started` event for `run_id`, if any.
pub fn run_started(events: &[EventEnvelope], run_id: &RunId) -> Option<RunStarted> {
    events.iter().find_map(|e| match &e.kind {
        EventKind::RunStarted {
            workflow_id,
            workflow_hash,
            ..
        } if e.scope.as_ref().map(|s| &s.run_id) == Some(run_id) => Some(RunStarted {
            workflow_id: workflow_id.clone(),
            workflow_hash: workflow_hash.clone(),
        }),
        _ => None,
    })
}

/// Everything recorded about a materialized node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub parent_node_id: Option<NodeId>,
    pub workflow_hash: WorkflowHash,
    pub snapshot_ref: String,
}

/// Find a node by id, searching every `node_created` event.
pub fn find_node(events: &[EventEnvelope], node_id: &NodeId) -> Option<NodeView> {
    events.iter().find_map(|e| match &e.kind {
        EventKind::NodeCreated {
            node_id: nid,
            node_kind,
            parent_node_id,
            workflow_hash,
            snapshot_ref,
        } if nid == node_id => Some(NodeView {
            node_id: nid.clone(),
            node_kind: *node_kind,
            parent_node_id: parent_node_id.clone(),
            workflow_hash: workflow_hash.clone(),
            snapshot_ref: snapshot_ref.clone(),
        }),
        _ => None,
    })
}

/// The run a node belongs to, found via the `node_created` event's scope.
pub fn run_of_node(events: &[EventEnvelope], node_id: &NodeId) -> Option<RunId> {
    events.iter().find_map(|e| match &e.kind {
        EventKind::NodeCreated { node_id: nid, .. } if nid == node_id => {
            e.scope.as_ref().map(|s| s.run_id.clone())
        }
        _ => None,
    })
}

/// Outgoing `edge_created` events whose source is `node_id`, in log order.
pub fn forward_edges<'a>(
    events: &'a [EventEnvelope],
    node_id: &NodeId,
) -> Vec<(&'a NodeId, EdgeCause)> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::EdgeCreated {
                from_node_id,
                to_node_id,
                cause,
                ..
            } if from_node_id == node_id => Some((to_node_id, *cause)),
            _ => None,
        })
        .collect()
}

/// Tips of a run's DAG: nodes belonging to `run_id` with no outgoing edge.
pub fn tips(events: &[EventEnvelope], run_id: &RunId) -> Vec<NodeId> {
    let mut run_nodes = Vec::new();
    let mut has_outgoing: HashSet<&NodeId> = HashSet::new();

    for e in events {
        match &e.kind {
            EventKind::NodeCreated { node_id, .. }
                if e.scope.as_ref().map(|s| &s.run_id) == Some(run_id) =>
            {
                run_nodes.push(node_id.clone());
            }
            EventKind::EdgeCreated { from_node_id, .. } => {
                has_outgoing.insert(from_node_id);
            }
            _ => {}
        }
    }

    run_nodes
        .into_iter()
        .filter(|n| !has_outgoing.contains(n))
        .collect()
}

/// The most recently appended `preference_set` payload, if any (no
/// per-node scoping: preferences are session-wide, spec §3.2).
pub fn preferences(events: &[EventEnvelope]) -> Option<Preferences> {
    events.iter().rev().find_map(|e| match &e.kind {
        EventKind::PreferenceSet { preferences } => Some(preferences.clone()),
        _ => None,
    })
}

/// Locate a previously recorded `advance_recorded` event for
/// `(node_id, attempt_id)` by its dedupe key, fulfilling the
/// fact-returning replay path (spec §4.5.4).
pub fn advance_recorded<'a>(
    events: &'a [EventEnvelope],
    dedupe_key: &str,
) -> Option<&'a EventEnvelope> {
    events.iter().find(|e| {
        matches!(&e.kind, EventKind::AdvanceRecorded { .. }) && e.dedupe_key == dedupe_key
    })
}

/// All `(attempt_id, intent)` pairs ever recorded for any node, used to
/// decide distinctness during fork detection.
pub fn recorded_attempts(events: &[EventEnvelope]) -> HashMap<AttemptId, AdvanceIntent> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::AdvanceRecorded {
                attempt_id, intent, ..
            } => Some((attempt_id.clone(), intent.clone())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[path = "projections_tests.rs"]
mod tests;
