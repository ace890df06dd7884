// SPDX-License-Identifier: MIT OR Apache-2.0

//! The append-only per-session event log store (spec §4.3).

use std::collections::HashSet;
use std::sync::Arc;

use wr_core::event::{EventEnvelope, EventKind};
use wr_core::{EventId, SessionId};
use wr_fs::{DataDir, FsPort};

use crate::error::{CorruptionLocation, CorruptionReason, StoreError};
use crate::manifest::{self, ManifestEntry};
use crate::segment;
use crate::witness::Witness;

/// A snapshot pin to attest alongside an append (spec §3.3).
#[derive(Debug, Clone)]
pub struct SnapshotPin {
    pub snapshot_ref: String,
    pub event_index: u64,
    pub created_by_event_id: EventId,
}

/// The batch submitted to `EventLogStore::append`.
#[derive(Debug, Default)]
pub struct AppendRequest {
    pub events: Vec<EventEnvelope>,
    pub snapshot_pins: Vec<SnapshotPin>,
}

/// What actually got written. Events already present by `dedupeKey` are
/// silently dropped (idempotent replay, spec §8.1 invariant 1); `appended`
/// reflects only the novel ones, with their assigned `eventIndex`.
#[derive(Debug, Default)]
pub struct AppendOutcome {
    pub appended: Vec<EventEnvelope>,
}

impl AppendOutcome {
    pub fn is_no_op(&self) -> bool {
        self.appended.is_empty()
    }
}

/// The result of loading a session's durable log.
#[derive(Debug, Default, Clone)]
pub struct LoadResult {
    pub events: Vec<EventEnvelope>,
    pub manifest: Vec<ManifestEntry>,
    pub pins: Vec<SnapshotPin>,
    /// sha256 of the most recently attested segment, used by the gate's
    /// health check as a cheap "did anything change" fingerprint.
    pub head_hash: Option<String>,
}

impl LoadResult {
    pub fn next_event_index(&self) -> u64 {
        self.events.len() as u64
    }

    pub fn dedupe_keys(&self) -> HashSet<&str> {
        self.events.iter().map(|e| e.dedupe_key.as_str()).collect()
    }
}

/// What `EventLogStore::salvage` recovered from a session `load` refuses.
#[derive(Debug, Clone)]
pub struct SalvageReport {
    pub recovered_events: usize,
    pub truncated_at_event_index: Option<u64>,
    pub salvage_path: std::path::PathBuf,
}

pub struct EventLogStore {
    fs: Arc<dyn FsPort>,
    data_dir: DataDir,
}

impl EventLogStore {
    pub fn new(fs: Arc<dyn FsPort>, data_dir: DataDir) -> Self {
        Self { fs, data_dir }
    }

    /// Load contract (spec §4.3): stream attested segments in order,
    /// verifying each digest, and detect pin-after-close corruption.
    pub fn load(&self, session_id: &SessionId) -> Result<LoadResult, StoreError> {
        let manifest_path = self.data_dir.session_manifest_path(session_id.as_str());
        let entries = manifest::read_manifest(self.fs.as_ref(), &manifest_path)?;

        let mut events = Vec::new();
        let mut pins = Vec::new();
        let mut head_hash = None;
        let mut expected_pins = 0u64;
        let mut pins_seen = 0u64;

        for entry in &entries {
            match entry {
                ManifestEntry::SegmentClosed {
                    first_event_index,
                    last_event_index,
                    segment_rel_path,
                    sha256,
                    expected_pins: this_expected_pins,
                    ..
                } => {
                    if expected_pins != pins_seen {
                        tracing::warn!(
                            session_id = %session_id,
                            expected_pins,
                            pins_seen,
                            "pin count mismatch before segment close"
                        );
                        return Err(StoreError::Corruption {
                            location: CorruptionLocation::Tail,
                            reason: CorruptionReason::PinAfterClose,
                        });
                    }
                    let segment_path = self
                        .data_dir
                        .session_dir(session_id.as_str())
                        .join(segment_rel_path);
                    if !self.fs.exists(&segment_path) {
                        tracing::warn!(
                            session_id = %session_id,
                            path = %segment_path.display(),
                            "attested segment missing from disk"
                        );
                        return Err(StoreError::Corruption {
                            location: CorruptionLocation::Tail,
                            reason: CorruptionReason::MissingAttestedSegment,
                        });
                    }
                    let bytes = self.fs.read_file_bytes(&segment_path)?;
                    let segment_events = segment::decode_segment(&bytes, sha256)?;
                    let bounds_ok = segment_events.first().map(|e| e.event_index)
                        == Some(*first_event_index)
                        && segment_events.last().map(|e| e.event_index) == Some(*last_event_index);
                    if !bounds_ok {
                        tracing::warn!(
                            session_id = %session_id,
                            path = %segment_path.display(),
                            "segment event index bounds do not match manifest"
                        );
                        return Err(StoreError::Corruption {
                            location: CorruptionLocation::Tail,
                            reason: CorruptionReason::DigestMismatch,
                        });
                    }
                    events.extend(segment_events);
                    head_hash = Some(sha256.clone());
                    expected_pins = *this_expected_pins;
                    pins_seen = 0;
                }
                ManifestEntry::SnapshotPinned {
                    snapshot_ref,
                    event_index,
                    created_by_event_id,
                } => {
                    pins.push(SnapshotPin {
                        snapshot_ref: snapshot_ref.clone(),
                        event_index: *event_index,
                        created_by_event_id: created_by_event_id.clone(),
                    });
                    pins_seen += 1;
                }
            }
        }

        if expected_pins != pins_seen {
            return Err(StoreError::Corruption {
                location: CorruptionLocation::Tail,
                reason: CorruptionReason::PinAfterClose,
            });
        }

        Ok(LoadResult {
            events,
            manifest: entries,
            pins,
            head_hash,
        })
    }

    /// Best-effort recovery read for a session `load` refuses as corrupt:
    /// walk the manifest's attested segments in order and keep every
    /// event line that still parses and still falls within its segment's
    /// attested bounds, stopping at the first segment that doesn't,
    /// mirroring the teacher's corrupt-WAL-to-`.bak` rotation in spirit
    /// (salvage what's readable, never guess past it). Writes the
    /// recovered events to a sibling `salvaged.jsonl` file and never
    /// touches the original manifest or segments.
    ///
    /// This is an operator-facing export primitive, not part of the
    /// `load` contract; nothing in the engine calls it.
    pub fn salvage(&self, session_id: &SessionId) -> Result<SalvageReport, StoreError> {
        let manifest_path = self.data_dir.session_manifest_path(session_id.as_str());
        let entries = manifest::read_manifest(self.fs.as_ref(), &manifest_path).unwrap_or_default();

        let mut recovered = Vec::new();
        let mut truncated_at_segment = None;

        for entry in &entries {
            let ManifestEntry::SegmentClosed {
                first_event_index,
                segment_rel_path,
                ..
            } = entry
            else {
                continue;
            };
            let segment_path = self
                .data_dir
                .session_dir(session_id.as_str())
                .join(segment_rel_path);
            let Ok(bytes) = self.fs.read_file_bytes(&segment_path) else {
                truncated_at_segment = Some(*first_event_index);
                break;
            };
            let text = String::from_utf8_lossy(&bytes);
            let mut segment_ok = true;
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<EventEnvelope>(line) {
                    Ok(event) => recovered.push(event),
                    Err(_) => {
                        segment_ok = false;
                        break;
                    }
                }
            }
            if !segment_ok {
                truncated_at_segment = Some(*first_event_index);
                break;
            }
        }

        let salvage_path = self
            .data_dir
            .session_events_dir(session_id.as_str())
            .join("salvaged.jsonl");
        let (bytes, _) = segment::encode_segment(&recovered)?;
        self.fs.write_file_bytes(&salvage_path, &bytes)?;

        if let Some(at) = truncated_at_segment {
            tracing::warn!(
                session_id = %session_id,
                recovered_events = recovered.len(),
                truncated_at_event_index = at,
                "salvage stopped at the first unreadable segment"
            );
        }

        Ok(SalvageReport {
            recovered_events: recovered.len(),
            truncated_at_event_index: truncated_at_segment,
            salvage_path,
        })
    }

    /// Append contract (spec §4.3). Requires a live witness minted by the
    /// execution session gate for this session.
    pub fn append(
        &self,
        witness: &Witness<'_>,
        request: AppendRequest,
    ) -> Result<AppendOutcome, StoreError> {
        witness.check_live()?;
        let session_id = witness.session_id().clone();

        let current = self.load(&session_id)?;
        let existing_keys = current.dedupe_keys();

        let fresh: Vec<EventEnvelope> = request
            .events
            .into_iter()
            .filter(|e| !existing_keys.contains(e.dedupe_key.as_str()))
            .collect();

        if fresh.is_empty() {
            return Ok(AppendOutcome::default());
        }

        let mut next_index = current.next_event_index();
        let mut assigned = Vec::with_capacity(fresh.len());
        for mut event in fresh {
            if let Some(node_id) = event.scope.as_ref().and_then(|s| s.node_id.clone()) {
                let already_created = current
                    .events
                    .iter()
                    .chain(assigned.iter())
                    .any(|e: &EventEnvelope| {
                        matches!(&e.kind, EventKind::NodeCreated { node_id: nid, .. } if *nid == node_id)
                    });
                if !already_created {
                    return Err(StoreError::NodeCreatedMustPrecedeScope {
                        node_id: node_id.as_str().to_string(),
                    });
                }
            }
            event.event_index = next_index;
            next_index += 1;
            assigned.push(event);
        }

        let first_index = assigned[0].event_index;
        let last_index = assigned[assigned.len() - 1].event_index;
        let (bytes, sha256) = segment::encode_segment(&assigned)?;

        let segment_rel_path = format!("events/{first_index}-{last_index}.jsonl");
        let segment_path =
            self.data_dir
                .session_segment_path(session_id.as_str(), first_index, last_index);
        let events_dir = self.data_dir.session_events_dir(session_id.as_str());

        self.fs.open_exclusive(&segment_path, &bytes)?;
        self.fs.fsync_file(&segment_path)?;

        let manifest_path = self.data_dir.session_manifest_path(session_id.as_str());
        manifest::append_manifest_entry(
            self.fs.as_ref(),
            &manifest_path,
            &ManifestEntry::SegmentClosed {
                first_event_index: first_index,
                last_event_index: last_index,
                segment_rel_path,
                sha256,
                bytes: bytes.len() as u64,
                expected_pins: request.snapshot_pins.len() as u64,
            },
        )?;
        self.fs.fsync_dir(&events_dir)?;

        for pin in &request.snapshot_pins {
            manifest::append_manifest_entry(
                self.fs.as_ref(),
                &manifest_path,
                &ManifestEntry::SnapshotPinned {
                    snapshot_ref: pin.snapshot_ref.clone(),
                    event_index: pin.event_index,
                    created_by_event_id: pin.created_by_event_id.clone(),
                },
            )?;
        }

        Ok(AppendOutcome { appended: assigned })
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
