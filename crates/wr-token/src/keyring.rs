// SPDX-License-Identifier: MIT OR Apache-2.0

//! The HMAC keyring (spec §4.6 "Keyring").
//!
//! `current` signs new tokens; `previous` (if any) is kept only so tokens
//! signed before the last rotation keep verifying. Corruption here --
//! unparseable JSON or a missing `current` -- is always fail-closed.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use wr_fs::{DataDir, FsPort};

use crate::error::KeyringError;

const ALG: &str = "HS256";
const KEY_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub alg: String,
    pub key_base64_url: String,
}

impl KeyMaterial {
    fn generate() -> Self {
        let mut bytes = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self {
            alg: ALG.to_string(),
            key_base64_url: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    fn key_bytes(&self) -> Result<Vec<u8>, KeyringError> {
        URL_SAFE_NO_PAD
            .decode(&self.key_base64_url)
            .map_err(|e| KeyringError::Corruption {
                reason: format!("key material is not valid base64url: {e}"),
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyringFile {
    v: u32,
    current: KeyMaterial,
    previous: Option<KeyMaterial>,
}

/// Process-wide shared-read, singleton-writer keyring handle.
pub struct Keyring {
    fs: Arc<dyn FsPort>,
    path: std::path::PathBuf,
    state: RwLock<KeyringFile>,
}

impl Keyring {
    /// Load the keyring from disk, or generate and persist a fresh one on
    /// first use (spec §4.6: "On first use, generate a 256-bit random
    /// key... exclusive-create").
    pub fn load_or_create(fs: Arc<dyn FsPort>, data_dir: &DataDir) -> Result<Self, KeyringError> {
        let path = data_dir.keyring_path();

        let state = if fs.exists(&path) {
            Self::read_and_parse(fs.as_ref(), &path)?
        } else {
            let fresh = KeyringFile {
                v: 1,
                current: KeyMaterial::generate(),
                previous: None,
            };
            let bytes = serde_json::to_vec(&fresh).map_err(|e| KeyringError::Corruption {
                reason: format!("failed to serialize fresh keyring: {e}"),
            })?;
            match fs.open_exclusive(&path, &bytes) {
                Ok(()) => fresh,
                // Another process created it first; defer to whatever it wrote.
                Err(err) if err.code() == "FS_EXISTS" => {
                    Self::read_and_parse(fs.as_ref(), &path)?
                }
                Err(err) => return Err(KeyringError::Fs(err)),
            }
        };

        Ok(Self {
            fs,
            path,
            state: RwLock::new(state),
        })
    }

    fn read_and_parse(fs: &dyn FsPort, path: &std::path::Path) -> Result<KeyringFile, KeyringError> {
        let bytes = fs.read_file_bytes(path)?;
        serde_json::from_slice(&bytes).map_err(|e| KeyringError::Corruption {
            reason: format!("keyring is not valid JSON: {e}"),
        })
    }

    /// `(alg, key bytes)` of the currently active signing key.
    pub fn current_key(&self) -> Result<Vec<u8>, KeyringError> {
        self.state.read().current.key_bytes()
    }

    /// The previous key, if rotation has happened at least once.
    pub fn previous_key(&self) -> Result<Option<Vec<u8>>, KeyringError> {
        match &self.state.read().previous {
            Some(material) => Ok(Some(material.key_bytes()?)),
            None => Ok(None),
        }
    }

    /// Rotate: the current key becomes `previous`, a fresh key becomes
    /// `current`. Tokens signed with the old `previous` key (two rotations
    /// back) stop verifying (spec §8.1 invariant 8).
    pub fn rotate(&self) -> Result<(), KeyringError> {
        let mut guard = self.state.write();
        let rotated = KeyringFile {
            v: guard.v,
            current: KeyMaterial::generate(),
            previous: Some(guard.current.clone()),
        };
        let bytes = serde_json::to_vec(&rotated).map_err(|e| KeyringError::Corruption {
            reason: format!("failed to serialize rotated keyring: {e}"),
        })?;
        self.fs.write_file_bytes(&self.path, &bytes)?;
        *guard = rotated;
        Ok(())
    }
}

#[cfg(test)]
#[path = "keyring_tests.rs"]
mod tests;
