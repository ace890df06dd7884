// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes of tool responses (spec §6.2, §6.3).

use serde::{Deserialize, Serialize};

use crate::workflow::StepView;

/// The pending-step metadata surfaced alongside a state/ack token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStep {
    pub step_id: String,
    pub title: String,
    pub prompt: String,
    pub require_confirmation: bool,
}

impl From<StepView> for PendingStep {
    fn from(view: StepView) -> Self {
        Self {
            step_id: view.step_id,
            title: view.title,
            prompt: view.prompt,
            require_confirmation: view.require_confirmation,
        }
    }
}

/// Autonomy / risk preferences echoed back on every response (spec §3.2,
/// §6.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesView {
    pub autonomy: String,
    pub risk_policy: String,
}

impl Default for PreferencesView {
    fn default() -> Self {
        Self {
            autonomy: "default".to_string(),
            risk_policy: "default".to_string(),
        }
    }
}

/// A template telling the caller exactly how to make its next call
/// (spec §4.5.1 step 7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCall {
    pub tool: String,
    pub intent: String,
}

/// The shape shared by `start_workflow`, `continue_workflow{advance}`, and
/// `continue_workflow{rehydrate}` (spec §6.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub state_token: String,
    pub ack_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingStep>,
    pub is_complete: bool,
    pub next_intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_call: Option<NextCall>,
    pub preferences: PreferencesView,
}

/// One candidate returned by `resume_session` — the same pending-step
/// metadata as a `WorkflowResponse`, but scoped to a session/run/node the
/// caller must pick among (spec §6.2: "resume_session returns a bounded
/// list of candidates each with its own freshly-minted stateToken").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeCandidate {
    pub session_id: String,
    pub run_id: String,
    pub node_id: String,
    pub state_token: String,
    pub pending: Option<PendingStep>,
}

/// Retry guidance carried on an error envelope (spec §6.3). `message` must
/// never embed retry guidance; this field is the only place it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RetrySpec {
    NotRetryable,
    RetryableImmediately,
    RetryableAfter { after_ms: u64 },
}

/// Extra, code-specific detail attached to an error envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bech32m_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// The closed error envelope every failed tool call returns (spec §6.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub envelope_type: String,
    pub code: String,
    pub message: String,
    pub retry: RetrySpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl ErrorEnvelope {
    pub fn new(code: &'static str, message: impl Into<String>, retry: RetrySpec) -> Self {
        Self {
            envelope_type: "error".to_string(),
            code: code.to_string(),
            message: message.into(),
            retry,
            details: None,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
