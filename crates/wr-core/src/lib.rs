// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-core: shared identifiers, event types, engine state, clock, and
//! canonical serialization used by every other WorkRail crate.

pub mod canonical;
pub mod clock;
pub mod engine_state;
pub mod event;
pub mod id;

pub use clock::{Clock, FakeClock, SystemClock};
pub use engine_state::{BlockedKind, EngineState, LoopFrame};
pub use event::{
    AdvanceIntent, AdvanceOutcome, EdgeCause, EdgeKind, EventEnvelope, EventKind, NodeKind,
    OutputChannel, OutputPayload, Preferences, Scope, WorkflowSource, EVENT_SCHEMA_VERSION,
};
pub use id::{
    AttemptId, EventId, IdError, IdGen, NodeId, RunId, SequentialIdGen, SessionId, ShortId,
    UuidIdGen, WorkflowHash,
};
