// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wr-storage: the append-only per-session event log and the
//! content-addressed snapshot store it and the pinned-workflow store
//! share.

pub mod error;
pub mod event_log;
pub mod manifest;
pub mod segment;
pub mod snapshot_store;
pub mod witness;

pub use error::{CorruptionLocation, CorruptionReason, StoreError};
pub use event_log::{
    AppendOutcome, AppendRequest, EventLogStore, LoadResult, SalvageReport, SnapshotPin,
};
pub use manifest::ManifestEntry;
pub use snapshot_store::{EnginePayload, ExecutionSnapshotV1, PinnedWorkflowV1, SnapshotStore};
pub use witness::{Witness, WitnessRelease};
