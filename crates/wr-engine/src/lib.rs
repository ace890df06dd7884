// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-engine: the start/continue state machine (spec §4.5) built on top of
//! the event log, snapshot store, session gate, and token codec. This is
//! the only crate that knows how those collaborators fit together.

pub mod continue_;
pub mod engine;
pub mod error;
pub mod fork;
pub mod projections;
pub mod response;
pub mod start;
pub mod workflow;

pub use continue_::{advance, rehydrate, resume_session, AdvanceRequest};
pub use engine::Engine;
pub use error::{EngineError, ScopeMismatchReason};
pub use response::{
    ErrorDetails, ErrorEnvelope, NextCall, PendingStep, PreferencesView, ResumeCandidate,
    RetrySpec, WorkflowResponse,
};
pub use start::{start_workflow, MAX_CONTEXT_BYTES};
pub use workflow::{
    Advance, AdvanceError, AdvanceInput, AdvanceOutcome, ArtifactOutput, ProviderError, StepView,
    WorkflowDef, WorkflowProvider,
};
