// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-fs: the data directory layout and the filesystem port the rest of
//! WorkRail is built on. Nothing outside this crate calls `std::fs`
//! directly.

pub mod data_dir;
pub mod error;
pub mod port;

pub use data_dir::{DataDir, DataDirError, DATA_DIR_ENV_VAR};
pub use error::FsError;
pub use port::{AppendHandle, FileStat, FsPort, RealFs};
