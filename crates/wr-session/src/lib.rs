// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-session: the per-session advisory lock and the execution session
//! gate built on top of it and the event log store.

pub mod error;
pub mod gate;
pub mod lock;

pub use error::{GateError, LockError};
pub use gate::ExecutionSessionGate;
pub use lock::{LockContents, LockHandle, SessionLock};
