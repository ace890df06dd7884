// SPDX-License-Identifier: MIT OR Apache-2.0

//! Segment file encoding: one durable event per line, sha256 over the
//! exact bytes written (spec §3.3).

use sha2::{Digest, Sha256};
use wr_core::event::EventEnvelope;

use crate::error::StoreError;

/// Serialize a run of events into the bytes a segment file holds, and
/// the sha256 hex digest of those exact bytes.
pub fn encode_segment(events: &[EventEnvelope]) -> Result<(Vec<u8>, String), StoreError> {
    let mut bytes = Vec::new();
    for event in events {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        bytes.extend_from_slice(&line);
    }
    let digest = format!("{:x}", Sha256::digest(&bytes));
    Ok((bytes, digest))
}

/// Parse a segment's bytes back into events, verifying the digest
/// matches what the manifest attested.
pub fn decode_segment(
    bytes: &[u8],
    attested_sha256: &str,
) -> Result<Vec<EventEnvelope>, StoreError> {
    let actual = format!("{:x}", Sha256::digest(bytes));
    if actual != attested_sha256 {
        return Err(StoreError::Corruption {
            location: crate::error::CorruptionLocation::Tail,
            reason: crate::error::CorruptionReason::DigestMismatch,
        });
    }
    let text = String::from_utf8_lossy(bytes);
    let mut events = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}

#[cfg(test)]
#[path = "segment_tests.rs"]
mod tests;
