// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine state sum type (spec §3.4). This is the payload the
//! interpreter collaborator (`wr-engine::workflow::Advance`) reads and
//! produces, and what the snapshot store persists content-addressed.

use crate::id::AttemptId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single frame of loop nesting the interpreter is currently inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopFrame {
    pub loop_id: String,
    pub iteration: u64,
}

/// Why a `blocked` state cannot simply be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockedKind {
    /// Advancing from here with a fresh attempt is allowed.
    RetryableBlock { retry_attempt_id: AttemptId },
    /// This block is final; any further advance attempt is rejected.
    TerminalBlock,
}

/// The engine's execution state — a closed sum type (spec §3.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineState {
    Init,
    Running {
        completed: BTreeSet<String>,
        loop_stack: Vec<LoopFrame>,
        pending: String,
    },
    Blocked {
        blocked: BlockedKind,
        blockers: Vec<String>,
        primary_reason: String,
    },
    Complete,
}

impl EngineState {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EngineState::Init => "init",
            EngineState::Running { .. } => "running",
            EngineState::Blocked { .. } => "blocked",
            EngineState::Complete => "complete",
        }
    }

    /// Deterministic derivation of a retry attempt id from the attempt that
    /// produced the block (spec §9: "deterministic minting under replay").
    pub fn derive_retry_attempt_id(source_attempt: &AttemptId) -> AttemptId {
        AttemptId::new(format!("retry:{source_attempt}"))
    }
}

#[cfg(test)]
#[path = "engine_state_tests.rs"]
mod tests;
