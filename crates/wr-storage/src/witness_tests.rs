use super::*;
use wr_core::SessionId;

#[test]
fn fresh_witness_is_live() {
    let (witness, _release) = Witness::mint(SessionId::new("sess-1"));
    assert!(witness.check_live().is_ok());
}

#[test]
fn released_witness_fails_check_live() {
    let (witness, release) = Witness::mint(SessionId::new("sess-1"));
    release.release();
    let err = witness.check_live().unwrap_err();
    assert_eq!(err.wire_code(), "SESSION_STORE_INVARIANT_VIOLATION");
}

#[test]
fn dropping_the_release_handle_also_invalidates_witness() {
    let (witness, release) = Witness::mint(SessionId::new("sess-1"));
    drop(release);
    assert!(witness.check_live().is_err());
}
