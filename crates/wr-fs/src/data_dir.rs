// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of the WorkRail-owned data root and its subdirectories
//! (spec §4.1, §6.1).

use std::env;
use std::path::{Path, PathBuf};

/// Environment override for the data root.
pub const DATA_DIR_ENV_VAR: &str = "WORKRAIL_DATA_DIR";

/// The WorkRail data root and its fixed subdirectory layout.
///
/// This is a pure path-computation helper; it performs no I/O itself.
/// Directory creation happens through `FsPort::mkdir_p` at the call sites
/// that actually need a directory to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data root: `WORKRAIL_DATA_DIR` if set, else
    /// `$HOME/.workrail/data`.
    pub fn resolve() -> Result<Self, DataDirError> {
        if let Ok(dir) = env::var(DATA_DIR_ENV_VAR) {
            return Ok(Self {
                root: PathBuf::from(dir),
            });
        }
        let home = env::var("HOME").map_err(|_| DataDirError::NoHome)?;
        Ok(Self {
            root: PathBuf::from(home).join(".workrail").join("data"),
        })
    }

    /// Build a `DataDir` rooted at an explicit path, bypassing environment
    /// resolution. Used by tests that need isolated temp roots.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(session_id)
    }

    pub fn session_lock_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("lock")
    }

    pub fn session_manifest_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("manifest.jsonl")
    }

    pub fn session_events_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("events")
    }

    pub fn session_segment_path(
        &self,
        session_id: &str,
        first_event_index: u64,
        last_event_index: u64,
    ) -> PathBuf {
        self.session_events_dir(session_id)
            .join(format!("{first_event_index}-{last_event_index}.jsonl"))
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    pub fn keyring_path(&self) -> PathBuf {
        self.keys_dir().join("keyring.json")
    }

    pub fn pinned_workflows_dir(&self) -> PathBuf {
        self.root.join("workflows").join("pinned")
    }

    /// The sharded path `<root>/<subdir>/<aa>/<bb>/<hex>` used by the
    /// content-addressed stores (spec §3.4, §6.1). `hex` is a full
    /// lowercase sha256 hex digest; the first two bytes become the
    /// sharding directories.
    pub fn cas_path(base: &Path, hex_digest: &str) -> PathBuf {
        let aa = &hex_digest[0..2];
        let bb = &hex_digest[2..4];
        let rest = &hex_digest[4..];
        base.join(aa).join(bb).join(rest)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataDirError {
    #[error("could not determine home directory: HOME is not set")]
    NoHome,
}

#[cfg(test)]
#[path = "data_dir_tests.rs"]
mod tests;
