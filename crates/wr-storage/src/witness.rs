// SPDX-License-Identifier: MIT OR Apache-2.0

//! The witness capability (spec §4.3, §4.4, glossary "Witness").
//!
//! A witness is minted by the execution session gate for the duration of
//! a single callback and is the only token `EventLogStore::append`
//! accepts. Its lifetime parameter keeps well-behaved callers from
//! holding one past the callback; the `released` flag backs that up with
//! a runtime check so a witness smuggled out some other way (stored in a
//! wider-lived struct, sent across a channel) still fails loudly instead
//! of silently bypassing the lock.

use crate::error::StoreError;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wr_core::SessionId;

/// Capability authorizing exactly one durable `append` call.
pub struct Witness<'gate> {
    session_id: SessionId,
    released: Arc<AtomicBool>,
    _marker: PhantomData<&'gate ()>,
}

impl<'gate> Witness<'gate> {
    /// Mint a witness. Only the gate should call this; callers elsewhere
    /// in the tree have no legitimate use for a fresh witness.
    pub fn mint(session_id: SessionId) -> (Self, WitnessRelease) {
        let released = Arc::new(AtomicBool::new(false));
        let witness = Witness {
            session_id,
            released: Arc::clone(&released),
            _marker: PhantomData,
        };
        (witness, WitnessRelease { released })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub(crate) fn check_live(&self) -> Result<(), StoreError> {
        if self.released.load(Ordering::SeqCst) {
            Err(StoreError::WitnessMisuseAfterRelease)
        } else {
            Ok(())
        }
    }
}

/// Held by the gate; dropping or calling `release()` invalidates every
/// `Witness` minted alongside it.
pub struct WitnessRelease {
    released: Arc<AtomicBool>,
}

impl WitnessRelease {
    pub fn release(self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl Drop for WitnessRelease {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "witness_tests.rs"]
mod tests;
