// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fork detection (spec §4.5.5): deciding the `cause` of a new forward
//! edge out of a source node.
//!
//! Replaying a previously seen `attemptId` never reaches this module —
//! that's handled entirely by the fact-returning replay path in
//! `continue_`. This module only ever sees genuinely new attempts, so its
//! whole job collapses to a count over the edges a source already has.

use wr_core::event::EdgeCause;

/// Decide the cause for a new forward edge leaving a source node, given
/// the causes of every edge the source already has (in log order).
///
/// - No prior edges: the first-ever child is `idempotent_replay`.
/// - Prior edges exist, none yet tagged `intentional_fork`: this new child
///   becomes the one and only `intentional_fork`.
/// - An `intentional_fork` already exists at this source: every later
///   distinct attempt is `non_tip_advance`.
pub fn cause_for_new_edge(existing_causes: &[EdgeCause]) -> EdgeCause {
    if existing_causes.is_empty() {
        return EdgeCause::IdempotentReplay;
    }
    if existing_causes
        .iter()
        .any(|c| *c == EdgeCause::IntentionalFork)
    {
        EdgeCause::NonTipAdvance
    } else {
        EdgeCause::IntentionalFork
    }
}

#[cfg(test)]
#[path = "fork_tests.rs"]
mod tests;
