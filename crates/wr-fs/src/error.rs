// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;
use thiserror::Error;

/// The closed error set the FS port surfaces to its callers.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("already exists: {path}")]
    Exists { path: String },

    #[error("permission denied: {path}")]
    Permission { path: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound { .. } => "FS_NOT_FOUND",
            FsError::Exists { .. } => "FS_EXISTS",
            FsError::Permission { .. } => "FS_PERMISSION",
            FsError::Io { .. } => "FS_IO_ERROR",
        }
    }

    pub(crate) fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path },
            io::ErrorKind::AlreadyExists => FsError::Exists { path },
            io::ErrorKind::PermissionDenied => FsError::Permission { path },
            _ => FsError::Io { path, source },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
