// SPDX-License-Identifier: MIT OR Apache-2.0

//! The manifest: an append-only attestation log naming which segment
//! files and which snapshot refs are part of the durable record
//! (spec §3.3).

use serde::{Deserialize, Serialize};
use std::path::Path;
use wr_core::EventId;
use wr_fs::FsPort;

use crate::error::StoreError;

/// One attested fact recorded in `manifest.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManifestEntry {
    #[serde(rename = "segment_closed")]
    SegmentClosed {
        first_event_index: u64,
        last_event_index: u64,
        segment_rel_path: String,
        sha256: String,
        bytes: u64,
        /// How many `snapshot_pinned` entries this append intends to write
        /// afterward. Lets `load` detect the pin-after-close crash window
        /// (spec §4.3) without needing a separate journal.
        expected_pins: u64,
    },
    #[serde(rename = "snapshot_pinned")]
    SnapshotPinned {
        snapshot_ref: String,
        event_index: u64,
        created_by_event_id: EventId,
    },
}

impl ManifestEntry {
    pub fn as_segment_closed(&self) -> Option<(&str, &str, u64)> {
        match self {
            ManifestEntry::SegmentClosed {
                segment_rel_path,
                sha256,
                bytes,
                ..
            } => Some((segment_rel_path.as_str(), sha256.as_str(), *bytes)),
            ManifestEntry::SnapshotPinned { .. } => None,
        }
    }
}

/// Read every entry currently attested in the manifest, in order.
///
/// A missing manifest file means an empty (fresh) log: this is not an
/// error.
pub fn read_manifest(fs: &dyn FsPort, path: &Path) -> Result<Vec<ManifestEntry>, StoreError> {
    if !fs.exists(path) {
        return Ok(Vec::new());
    }
    let bytes = fs.read_file_bytes(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: ManifestEntry = serde_json::from_str(line).map_err(|_| StoreError::Corruption {
            location: crate::error::CorruptionLocation::Head,
            reason: crate::error::CorruptionReason::DigestMismatch,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Append one manifest entry and fsync the manifest file so it is
/// durable before the caller proceeds to the next step.
pub fn append_manifest_entry(
    fs: &dyn FsPort,
    path: &Path,
    entry: &ManifestEntry,
) -> Result<(), StoreError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    let mut handle = fs.open_append(path)?;
    handle.write_all(&line)?;
    handle.fsync()?;
    Ok(())
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
