use super::*;

#[test]
fn first_child_of_a_source_is_idempotent_replay() {
    assert_eq!(cause_for_new_edge(&[]), EdgeCause::IdempotentReplay);
}

#[test]
fn second_distinct_attempt_is_intentional_fork() {
    assert_eq!(
        cause_for_new_edge(&[EdgeCause::IdempotentReplay]),
        EdgeCause::IntentionalFork
    );
}

#[test]
fn third_distinct_attempt_is_non_tip_advance() {
    assert_eq!(
        cause_for_new_edge(&[EdgeCause::IdempotentReplay, EdgeCause::IntentionalFork]),
        EdgeCause::NonTipAdvance
    );
}

#[test]
fn fork_harness_n_distinct_attempts_yields_one_fork_and_n_minus_one_non_tip() {
    let mut causes = Vec::new();
    for i in 0..5 {
        let cause = cause_for_new_edge(&causes);
        if i == 0 {
            assert_eq!(cause, EdgeCause::IdempotentReplay);
        } else if i == 1 {
            assert_eq!(cause, EdgeCause::IntentionalFork);
        } else {
            assert_eq!(cause, EdgeCause::NonTipAdvance);
        }
        causes.push(cause);
    }

    let fork_count = causes
        .iter()
        .filter(|c| **c == EdgeCause::IntentionalFork)
        .count();
    let non_tip_count = causes
        .iter()
        .filter(|c| **c == EdgeCause::NonTipAdvance)
        .count();
    assert_eq!(fork_count, 1);
    assert_eq!(non_tip_count, 3);
    assert_eq!(causes.len(), 5);
}
