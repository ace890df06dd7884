// SPDX-License-Identifier: MIT OR Apache-2.0

//! The opaque token codec (spec §3.5, §4.6).
//!
//! Wire framing: canonical payload bytes, prefixed with a one-byte tag
//! naming token kind + version, suffixed with an HMAC-SHA256 tag over
//! `<tagByte><payloadBytes>`, the whole thing outer-encoded as bech32m.
//! Bech32m catches bit errors and HRP confusion before the HMAC ever runs.

use bech32::{Bech32m, Hrp};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use wr_core::{AttemptId, NodeId, RunId, SessionId};

use crate::error::{Bech32mErrorKind, TokenError};
use crate::keyring::Keyring;

type HmacSha256 = Hmac<Sha256>;

const STATE_HRP: &str = "stv1";
const ACK_HRP: &str = "ackv1";
const TAG_VERSION: u8 = 1;
const TAG_KIND_STATE: u8 = 1;
const TAG_KIND_ACK: u8 = 2;
const HMAC_TAG_LEN: usize = 32;

/// Names `(sessionId, runId, nodeId, workflowHashRef)` (spec §3.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTokenPayload {
    pub v: u32,
    pub session_id: SessionId,
    pub run_id: RunId,
    pub node_id: NodeId,
    pub workflow_hash_ref: String,
}

/// Names `(sessionId, runId, nodeId, attemptId)` (spec §3.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckTokenPayload {
    pub v: u32,
    pub session_id: SessionId,
    pub run_id: RunId,
    pub node_id: NodeId,
    pub attempt_id: AttemptId,
}

fn tag_byte(kind: u8) -> u8 {
    (kind << 4) | TAG_VERSION
}

fn tag_kind(tag: u8) -> u8 {
    tag >> 4
}

fn tag_version(tag: u8) -> u8 {
    tag & 0x0F
}

fn hmac_tag(key: &[u8], framed: &[u8]) -> Result<Vec<u8>, TokenError> {
    // HMAC-SHA256 accepts a key of any length, so this only fails if the
    // `hmac` crate's internal invariants are violated.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| TokenError::BadSignature)?;
    mac.update(framed);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_hmac(key: &[u8], framed: &[u8], tag: &[u8]) -> bool {
    match <HmacSha256 as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(framed);
            mac.verify_slice(tag).is_ok()
        }
        Err(_) => false,
    }
}

fn encode<T: Serialize>(kind: u8, hrp_str: &str, payload: &T, key: &[u8]) -> Result<String, TokenError> {
    let payload_bytes = wr_core::canonical::to_canonical_bytes(payload).map_err(|_| {
        TokenError::InvalidFormat {
            kind: Bech32mErrorKind::ChecksumFailed,
            position: None,
        }
    })?;

    let mut framed = Vec::with_capacity(1 + payload_bytes.len());
    framed.push(tag_byte(kind));
    framed.extend_from_slice(&payload_bytes);

    let tag = hmac_tag(key, &framed)?;
    framed.extend_from_slice(&tag);

    let hrp = Hrp::parse(hrp_str).map_err(|_| TokenError::InvalidFormat {
        kind: Bech32mErrorKind::HrpMismatch,
        position: None,
    })?;
    bech32::encode::<Bech32m>(hrp, &framed).map_err(|_| TokenError::InvalidFormat {
        kind: Bech32mErrorKind::ChecksumFailed,
        position: None,
    })
}

fn decode<T: for<'de> Deserialize<'de>>(
    expected_kind: u8,
    expected_hrp: &str,
    encoded: &str,
    keyring: &Keyring,
) -> Result<T, TokenError> {
    let (hrp, framed) = bech32::decode(encoded).map_err(|_| TokenError::InvalidFormat {
        kind: Bech32mErrorKind::ChecksumFailed,
        position: None,
    })?;

    if hrp.as_str() != expected_hrp {
        return Err(TokenError::InvalidFormat {
            kind: Bech32mErrorKind::HrpMismatch,
            position: None,
        });
    }

    if framed.len() < 1 + HMAC_TAG_LEN {
        return Err(TokenError::InvalidFormat {
            kind: Bech32mErrorKind::ChecksumFailed,
            position: None,
        });
    }

    let split_at = framed.len() - HMAC_TAG_LEN;
    let (signed, tag) = framed.split_at(split_at);
    let tag_byte_value = signed[0];
    let payload_bytes = &signed[1..];

    let current = keyring.current_key().map_err(|_| TokenError::BadSignature)?;
    let verified = verify_hmac(&current, signed, tag)
        || match keyring.previous_key() {
            Ok(Some(previous)) => verify_hmac(&previous, signed, tag),
            _ => false,
        };
    if !verified {
        return Err(TokenError::BadSignature);
    }

    if tag_kind(tag_byte_value) != expected_kind {
        return Err(TokenError::InvalidFormat {
            kind: Bech32mErrorKind::HrpMismatch,
            position: Some(0),
        });
    }
    if tag_version(tag_byte_value) != TAG_VERSION {
        return Err(TokenError::UnsupportedVersion);
    }

    serde_json::from_slice(payload_bytes).map_err(|_| TokenError::InvalidFormat {
        kind: Bech32mErrorKind::ChecksumFailed,
        position: None,
    })
}

/// Mint a fresh state token (spec §3.5, §4.6).
pub fn encode_state_token(payload: &StateTokenPayload, keyring: &Keyring) -> Result<String, TokenError> {
    let key = keyring.current_key().map_err(|_| TokenError::BadSignature)?;
    encode(TAG_KIND_STATE, STATE_HRP, payload, &key)
}

/// Mint a fresh ack token (spec §3.5, §4.6).
pub fn encode_ack_token(payload: &AckTokenPayload, keyring: &Keyring) -> Result<String, TokenError> {
    let key = keyring.current_key().map_err(|_| TokenError::BadSignature)?;
    encode(TAG_KIND_ACK, ACK_HRP, payload, &key)
}

/// Decode and verify a state token, trying the current key then the
/// previous one (spec §8.1 invariant 8: graceful rotation).
pub fn decode_state_token(encoded: &str, keyring: &Keyring) -> Result<StateTokenPayload, TokenError> {
    decode(TAG_KIND_STATE, STATE_HRP, encoded, keyring)
}

/// Decode and verify an ack token.
pub fn decode_ack_token(encoded: &str, keyring: &Keyring) -> Result<AckTokenPayload, TokenError> {
    decode(TAG_KIND_ACK, ACK_HRP, encoded, keyring)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
