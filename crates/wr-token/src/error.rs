// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;
use wr_fs::FsError;

/// Why a bech32m-encoded token failed to decode (spec §4.6, §8.2 scenario H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bech32mErrorKind {
    ChecksumFailed,
    HrpMismatch,
}

impl Bech32mErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Bech32mErrorKind::ChecksumFailed => "BECH32M_CHECKSUM_FAILED",
            Bech32mErrorKind::HrpMismatch => "BECH32M_HRP_MISMATCH",
        }
    }
}

/// The codec's closed error set (spec §4.6 "Decode").
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format: {kind:?}")]
    InvalidFormat {
        kind: Bech32mErrorKind,
        position: Option<usize>,
    },

    #[error("unsupported token version")]
    UnsupportedVersion,

    #[error("bad token signature")]
    BadSignature,
}

impl TokenError {
    pub fn wire_code(&self) -> &'static str {
        match self {
            TokenError::InvalidFormat { .. } => "TOKEN_INVALID_FORMAT",
            TokenError::UnsupportedVersion => "TOKEN_UNSUPPORTED_VERSION",
            TokenError::BadSignature => "TOKEN_BAD_SIGNATURE",
        }
    }
}

/// Keyring failures (spec §4.6 "Keyring"). Always fail-closed.
#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("keyring corruption detected: {reason}")]
    Corruption { reason: String },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
}

impl KeyringError {
    pub fn wire_code(&self) -> &'static str {
        "KEYRING_CORRUPTION_DETECTED"
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
