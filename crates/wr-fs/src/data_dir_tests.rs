use super::*;
use yare::parameterized;

#[test]
fn session_paths_nest_under_sessions_dir() {
    let dd = DataDir::at("/data");
    assert_eq!(
        dd.session_lock_path("sess-1"),
        Path::new("/data/sessions/sess-1/lock")
    );
    assert_eq!(
        dd.session_manifest_path("sess-1"),
        Path::new("/data/sessions/sess-1/manifest.jsonl")
    );
    assert_eq!(
        dd.session_segment_path("sess-1", 0, 2),
        Path::new("/data/sessions/sess-1/events/0-2.jsonl")
    );
}

#[test]
fn fixed_subdirectories_match_layout() {
    let dd = DataDir::at("/data");
    assert_eq!(dd.snapshots_dir(), Path::new("/data/snapshots"));
    assert_eq!(dd.keys_dir(), Path::new("/data/keys"));
    assert_eq!(dd.keyring_path(), Path::new("/data/keys/keyring.json"));
    assert_eq!(
        dd.pinned_workflows_dir(),
        Path::new("/data/workflows/pinned")
    );
}

#[parameterized(
    all_zero = { "0000000000000000000000000000000000000000000000000000000000000000", "00", "00" },
    mixed = { "ab12cd0000000000000000000000000000000000000000000000000000000000", "ab", "12" },
)]
fn cas_path_shards_by_first_two_bytes(hex: &str, aa: &str, bb: &str) {
    let path = DataDir::cas_path(Path::new("/data/snapshots"), hex);
    assert_eq!(
        path,
        Path::new("/data/snapshots").join(aa).join(bb).join(&hex[4..])
    );
}

#[test]
fn resolve_honors_env_override() {
    std::env::set_var(DATA_DIR_ENV_VAR, "/tmp/workrail-test-root");
    let dd = DataDir::resolve().unwrap();
    assert_eq!(dd.root(), Path::new("/tmp/workrail-test-root"));
    std::env::remove_var(DATA_DIR_ENV_VAR);
}
