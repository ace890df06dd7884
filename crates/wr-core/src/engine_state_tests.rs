use super::*;
use crate::id::AttemptId;

#[test]
fn kind_name_matches_variant() {
    assert_eq!(EngineState::Init.kind_name(), "init");
    assert_eq!(EngineState::Complete.kind_name(), "complete");
    let running = EngineState::Running {
        completed: BTreeSet::new(),
        loop_stack: Vec::new(),
        pending: "s1".to_string(),
    };
    assert_eq!(running.kind_name(), "running");
}

#[test]
fn retry_attempt_id_is_a_pure_function_of_source() {
    let source = AttemptId::new("attempt-7");
    let a = EngineState::derive_retry_attempt_id(&source);
    let b = EngineState::derive_retry_attempt_id(&source);
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "retry:attempt-7");
}

#[test]
fn retry_attempt_id_differs_by_source() {
    let a = EngineState::derive_retry_attempt_id(&AttemptId::new("x"));
    let b = EngineState::derive_retry_attempt_id(&AttemptId::new("y"));
    assert_ne!(a, b);
}

#[test]
fn blocked_state_round_trips() {
    let state = EngineState::Blocked {
        blocked: BlockedKind::RetryableBlock {
            retry_attempt_id: AttemptId::new("retry:attempt-1"),
        },
        blockers: vec!["missing approval".to_string()],
        primary_reason: "awaiting human".to_string(),
    };
    let json = serde_json::to_string(&state).expect("serialize");
    let back: EngineState = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, state);
}

#[test]
fn terminal_block_is_distinguishable_from_retryable() {
    let terminal = BlockedKind::TerminalBlock;
    let retryable = BlockedKind::RetryableBlock {
        retry_attempt_id: AttemptId::new("r"),
    };
    assert_ne!(
        serde_json::to_string(&terminal).unwrap(),
        serde_json::to_string(&retryable).unwrap()
    );
}
