use super::*;
use std::sync::Arc;
use tempfile::tempdir;
use wr_core::event::{NodeKind, Scope, WorkflowSource};
use wr_core::{RunId, WorkflowHash};
use wr_fs::RealFs;

fn store_at(root: &std::path::Path) -> EventLogStore {
    EventLogStore::new(Arc::new(RealFs), DataDir::at(root))
}

fn session_created(session_id: &SessionId, index: u64) -> EventEnvelope {
    EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: index,
        event_id: EventId::new(format!("evt-{index}")),
        session_id: session_id.clone(),
        scope: None,
        dedupe_key: format!("session_created:{session_id}"),
        kind: EventKind::SessionCreated,
    }
}

fn run_started(session_id: &SessionId, run_id: &RunId, index: u64) -> EventEnvelope {
    EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: index,
        event_id: EventId::new(format!("evt-{index}")),
        session_id: session_id.clone(),
        scope: Some(Scope {
            run_id: run_id.clone(),
            node_id: None,
        }),
        dedupe_key: format!("run_started:{session_id}:{run_id}"),
        kind: EventKind::RunStarted {
            workflow_id: "wf-1".to_string(),
            workflow_hash: WorkflowHash::of_canonical_bytes(b"wf-1"),
            source: WorkflowSource::Filesystem {
                path: "/workflows/wf-1.yaml".to_string(),
            },
        },
    }
}

fn node_created(
    session_id: &SessionId,
    run_id: &RunId,
    node_id: &wr_core::NodeId,
    index: u64,
) -> EventEnvelope {
    EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: index,
        event_id: EventId::new(format!("evt-{index}")),
        session_id: session_id.clone(),
        scope: Some(Scope {
            run_id: run_id.clone(),
            node_id: Some(node_id.clone()),
        }),
        dedupe_key: format!("node_created:{session_id}:{node_id}"),
        kind: EventKind::NodeCreated {
            node_id: node_id.clone(),
            node_kind: NodeKind::Step,
            parent_node_id: None,
            workflow_hash: WorkflowHash::of_canonical_bytes(b"wf-1"),
            snapshot_ref: "sha256:aaaa".to_string(),
        },
    }
}

#[test]
fn scenario_a_start_workflow_produces_one_closed_segment() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-a");
    let run_id = RunId::new("run-a");
    let node_id = wr_core::NodeId::new("node-a");

    let (witness, release) = Witness::mint(session_id.clone());
    let outcome = store
        .append(
            &witness,
            AppendRequest {
                events: vec![
                    session_created(&session_id, 0),
                    run_started(&session_id, &run_id, 1),
                    node_created(&session_id, &run_id, &node_id, 2),
                ],
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    release.release();

    assert_eq!(outcome.appended.len(), 3);
    let loaded = store.load(&session_id).unwrap();
    assert_eq!(loaded.events.len(), 3);
    assert_eq!(loaded.manifest.len(), 1);
    assert!(matches!(
        loaded.manifest[0],
        ManifestEntry::SegmentClosed {
            first_event_index: 0,
            last_event_index: 2,
            ..
        }
    ));
}

#[test]
fn idempotent_append_of_same_events_is_a_no_op() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-b");

    let (witness, _release) = Witness::mint(session_id.clone());
    let events = vec![session_created(&session_id, 0)];

    let first = store
        .append(
            &witness,
            AppendRequest {
                events: events.clone(),
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    assert!(!first.is_no_op());

    let second = store
        .append(
            &witness,
            AppendRequest {
                events,
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    assert!(second.is_no_op());

    let loaded = store.load(&session_id).unwrap();
    assert_eq!(loaded.events.len(), 1);
}

#[test]
fn witness_misuse_after_release_is_rejected() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-c");

    let (witness, release) = Witness::mint(session_id.clone());
    release.release();

    let err = store
        .append(
            &witness,
            AppendRequest {
                events: vec![session_created(&session_id, 0)],
                snapshot_pins: vec![],
            },
        )
        .unwrap_err();
    assert_eq!(err.wire_code(), "SESSION_STORE_INVARIANT_VIOLATION");
}

#[test]
fn scope_referencing_unknown_node_is_rejected() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-d");
    let run_id = RunId::new("run-d");
    let node_id = wr_core::NodeId::new("node-never-created");

    let (witness, _release) = Witness::mint(session_id.clone());
    let dangling = EventEnvelope {
        v: wr_core::EVENT_SCHEMA_VERSION,
        event_index: 0,
        event_id: EventId::new("evt-0"),
        session_id: session_id.clone(),
        scope: Some(Scope {
            run_id,
            node_id: Some(node_id),
        }),
        dedupe_key: "preference_set:sess-d:node-never-created".to_string(),
        kind: EventKind::PreferenceSet {
            preferences: wr_core::event::Preferences {
                autonomy: "supervised".to_string(),
                risk_policy: "conservative".to_string(),
            },
        },
    };

    let err = store
        .append(
            &witness,
            AppendRequest {
                events: vec![dangling],
                snapshot_pins: vec![],
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NodeCreatedMustPrecedeScope { .. }));
}

#[test]
fn scenario_d_corrupt_byte_in_attested_segment_is_digest_mismatch() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-e");

    let (witness, release) = Witness::mint(session_id.clone());
    store
        .append(
            &witness,
            AppendRequest {
                events: vec![session_created(&session_id, 0)],
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    release.release();

    let segment_path = DataDir::at(dir.path()).session_segment_path(session_id.as_str(), 0, 0);
    let mut bytes = std::fs::read(&segment_path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&segment_path, bytes).unwrap();

    let err = store.load(&session_id).unwrap_err();
    match err {
        StoreError::Corruption { location, reason } => {
            assert_eq!(location.as_str(), "tail");
            assert_eq!(reason.code(), "digest_mismatch");
        }
        other => panic!("expected corruption, got {other:?}"),
    }
}

#[test]
fn scenario_e_missing_attested_segment_file_is_detected() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-f");

    let (witness, release) = Witness::mint(session_id.clone());
    store
        .append(
            &witness,
            AppendRequest {
                events: vec![session_created(&session_id, 0)],
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    release.release();

    let segment_path = DataDir::at(dir.path()).session_segment_path(session_id.as_str(), 0, 0);
    std::fs::remove_file(&segment_path).unwrap();

    let err = store.load(&session_id).unwrap_err();
    match err {
        StoreError::Corruption { reason, .. } => {
            assert_eq!(reason.code(), "missing_attested_segment");
        }
        other => panic!("expected corruption, got {other:?}"),
    }
}

#[test]
fn pin_after_close_crash_window_is_detected_on_load() {
    let dir = tempdir().unwrap();
    let data_dir = DataDir::at(dir.path());
    let fs = RealFs;
    let session_id = SessionId::new("sess-g");

    let events = vec![session_created(&session_id, 0)];
    let (bytes, sha256) = segment::encode_segment(&events).unwrap();
    fs.open_exclusive(
        &data_dir.session_segment_path(session_id.as_str(), 0, 0),
        &bytes,
    )
    .unwrap();

    // Write segment_closed promising a pin that never shows up — this is the
    // exact crash window the pin-after-close lock guards against.
    manifest::append_manifest_entry(
        &fs,
        &data_dir.session_manifest_path(session_id.as_str()),
        &ManifestEntry::SegmentClosed {
            first_event_index: 0,
            last_event_index: 0,
            segment_rel_path: "events/0-0.jsonl".to_string(),
            sha256,
            bytes: bytes.len() as u64,
            expected_pins: 1,
        },
    )
    .unwrap();

    let store = EventLogStore::new(Arc::new(RealFs), data_dir);
    let err = store.load(&session_id).unwrap_err();
    match err {
        StoreError::Corruption { reason, .. } => {
            assert_eq!(reason.code(), "pin_after_close");
        }
        other => panic!("expected corruption, got {other:?}"),
    }
}

#[test]
fn orphan_segment_with_no_manifest_entry_is_ignored() {
    let dir = tempdir().unwrap();
    let data_dir = DataDir::at(dir.path());
    let fs = RealFs;
    let session_id = SessionId::new("sess-h");

    let orphan_events = vec![session_created(&session_id, 0)];
    let (bytes, _) = segment::encode_segment(&orphan_events).unwrap();
    fs.open_exclusive(
        &data_dir.session_segment_path(session_id.as_str(), 0, 0),
        &bytes,
    )
    .unwrap();

    let store = EventLogStore::new(Arc::new(RealFs), data_dir);
    let loaded = store.load(&session_id).unwrap();
    assert!(loaded.events.is_empty());
}

#[test]
fn salvage_recovers_everything_up_to_the_corrupt_segment() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-i");
    let run_id = RunId::new("run-i");

    let (witness, _release) = Witness::mint(session_id.clone());
    store
        .append(
            &witness,
            AppendRequest {
                events: vec![session_created(&session_id, 0)],
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    store
        .append(
            &witness,
            AppendRequest {
                events: vec![run_started(&session_id, &run_id, 1)],
                snapshot_pins: vec![],
            },
        )
        .unwrap();

    let segment_path = DataDir::at(dir.path()).session_segment_path(session_id.as_str(), 1, 1);
    let mut bytes = std::fs::read(&segment_path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    std::fs::write(&segment_path, bytes).unwrap();

    assert!(store.load(&session_id).is_err());

    let report = store.salvage(&session_id).unwrap();
    assert_eq!(report.recovered_events, 1);
    assert_eq!(report.truncated_at_event_index, Some(1));
    assert!(report.salvage_path.ends_with("salvaged.jsonl"));
    assert!(std::fs::read(&report.salvage_path)
        .unwrap()
        .windows(b"session_created".len())
        .any(|w| w == b"session_created"));
}

#[test]
fn salvage_on_an_intact_log_recovers_every_event_with_no_truncation() {
    let dir = tempdir().unwrap();
    let store = store_at(dir.path());
    let session_id = SessionId::new("sess-j");

    let (witness, release) = Witness::mint(session_id.clone());
    store
        .append(
            &witness,
            AppendRequest {
                events: vec![session_created(&session_id, 0)],
                snapshot_pins: vec![],
            },
        )
        .unwrap();
    release.release();

    let report = store.salvage(&session_id).unwrap();
    assert_eq!(report.recovered_events, 1);
    assert!(report.truncated_at_event_index.is_none());
}
