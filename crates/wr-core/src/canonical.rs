// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical (deterministic) UTF-8 JSON serialization.
//!
//! Used everywhere a digest must be stable across processes and platforms:
//! workflow hashes, snapshot content addresses, and token payload framing.
//! `serde_json::Value`'s map is a `BTreeMap` as long as the `preserve_order`
//! feature is not enabled (it isn't, workspace-wide), so object keys come
//! out sorted and two calls with the same logical value always produce
//! byte-identical output.

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum CanonicalError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` to its canonical byte representation.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&as_value)?)
}

/// Convenience: canonical bytes, then sha256, hex-encoded.
pub fn sha256_hex<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let bytes = to_canonical_bytes(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod tests;
