// SPDX-License-Identifier: MIT OR Apache-2.0

//! The filesystem port: the only primitives the core is allowed to use
//! to touch disk. Abstracted behind a trait so storage logic can be
//! tested without real I/O and so the durability ordering (fsync file,
//! rename, fsync parent dir) is enforced in exactly one place.

use crate::error::FsError;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A durable, append-only file handle returned by `open_append`.
pub trait AppendHandle: Send {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), FsError>;
    fn fsync(&mut self) -> Result<(), FsError>;
}

/// Metadata returned by `stat`.
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub len: u64,
}

/// The filesystem primitives the core depends on (spec §4.1).
///
/// Every method is fallible with the closed `FsError` set; no method
/// panics on a missing file or directory.
pub trait FsPort: Send + Sync {
    fn mkdir_p(&self, path: &Path) -> Result<(), FsError>;
    fn read_file_bytes(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Atomic write: temp file in the same directory, fsync the temp
    /// file, rename over the target, fsync the parent directory.
    fn write_file_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError>;

    /// Open (creating if absent) a file for buffered appends.
    fn open_append(&self, path: &Path) -> Result<Box<dyn AppendHandle>, FsError>;

    /// Create a new file, failing with `FsError::Exists` if it already exists.
    fn open_exclusive(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError>;

    fn fsync_file(&self, path: &Path) -> Result<(), FsError>;
    fn fsync_dir(&self, path: &Path) -> Result<(), FsError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;
    fn unlink(&self, path: &Path) -> Result<(), FsError>;
    fn stat(&self, path: &Path) -> Result<FileStat, FsError>;
    fn exists(&self, path: &Path) -> bool;
}

struct RealAppendHandle {
    file: File,
    path: PathBuf,
}

impl AppendHandle for RealAppendHandle {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), FsError> {
        self.file
            .write_all(buf)
            .map_err(|e| FsError::from_io(self.path.display().to_string(), e))
    }

    fn fsync(&mut self) -> Result<(), FsError> {
        self.file
            .sync_all()
            .map_err(|e| FsError::from_io(self.path.display().to_string(), e))
    }
}

/// The production `FsPort`, backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl RealFs {
    fn pathstr(path: &Path) -> String {
        path.display().to_string()
    }
}

impl FsPort for RealFs {
    fn mkdir_p(&self, path: &Path) -> Result<(), FsError> {
        fs::create_dir_all(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))
    }

    fn read_file_bytes(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        fs::read(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))
    }

    fn write_file_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        self.mkdir_p(parent)?;
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "write".to_string())
        ));
        {
            let mut tmp = File::create(&tmp_path)
                .map_err(|e| FsError::from_io(Self::pathstr(&tmp_path), e))?;
            tmp.write_all(bytes)
                .map_err(|e| FsError::from_io(Self::pathstr(&tmp_path), e))?;
            tmp.sync_all()
                .map_err(|e| FsError::from_io(Self::pathstr(&tmp_path), e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        self.fsync_dir(parent)?;
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<Box<dyn AppendHandle>, FsError> {
        if let Some(parent) = path.parent() {
            self.mkdir_p(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        Ok(Box::new(RealAppendHandle {
            file,
            path: path.to_path_buf(),
        }))
    }

    fn open_exclusive(&self, path: &Path, bytes: &[u8]) -> Result<(), FsError> {
        if let Some(parent) = path.parent() {
            self.mkdir_p(parent)?;
        }
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        file.write_all(bytes)
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        file.sync_all()
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), FsError> {
        let file = File::open(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        file.sync_all()
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), FsError> {
        let dir = File::open(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        dir.sync_all()
            .map_err(|e| FsError::from_io(Self::pathstr(path), e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        fs::rename(from, to).map_err(|e| FsError::from_io(Self::pathstr(from), e))
    }

    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        fs::remove_file(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))
    }

    fn stat(&self, path: &Path) -> Result<FileStat, FsError> {
        let meta = fs::metadata(path).map_err(|e| FsError::from_io(Self::pathstr(path), e))?;
        Ok(FileStat { len: meta.len() })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
#[path = "port_tests.rs"]
mod tests;
