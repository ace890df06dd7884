// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque identifier types and the id factory.
//!
//! Every kind of id in the system is a distinct type generated by
//! [`define_id!`]. Mixing kinds (passing a `RunId` where a `NodeId` is
//! expected) is a compile error, never a runtime check.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Characters that would break the `kind:value` framing used inside tokens
/// and on-disk paths.
const FORBIDDEN_CHARS: [char; 2] = [':', '/'];

/// Returns a string slice truncated to at most `n` characters.
pub trait ShortId {
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define an opaque, delimiter-safe newtype id wrapper around `String`.
///
/// Generates `new()` (which validates the delimiter-safety invariant),
/// `as_str()`, `short()`, `Display`, `PartialEq<str>`/`PartialEq<&str>`, and
/// `Borrow<str>`. Unlike a bare `String`, construction through `new()` is
/// the only public entry point, so every id in the system is guaranteed
/// free of `:`/`/` by the time it reaches a token or a file path.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string as this id kind.
            ///
            /// Panics only in debug builds on a malformed value produced by
            /// our own [`IdGen`]; ids arriving over the wire are validated
            /// with [`Self::parse`] instead.
            pub fn new(id: impl Into<String>) -> Self {
                let id = id.into();
                debug_assert!(
                    $crate::id::is_delimiter_safe(&id),
                    "id contains a forbidden delimiter character"
                );
                Self(id)
            }

            /// Parse an externally-supplied value, rejecting forbidden characters.
            pub fn parse(id: impl Into<String>) -> Result<Self, $crate::id::IdError> {
                let id = id.into();
                if id.is_empty() {
                    return Err($crate::id::IdError::Empty);
                }
                if !$crate::id::is_delimiter_safe(&id) {
                    return Err($crate::id::IdError::ForbiddenCharacter);
                }
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self, n: usize) -> &str {
                ShortId::short(self.0.as_str(), n)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

pub(crate) fn is_delimiter_safe(s: &str) -> bool {
    !s.chars().any(|c| FORBIDDEN_CHARS.contains(&c))
}

/// Errors parsing an id received from outside the process (e.g. a decoded token).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id is empty")]
    Empty,
    #[error("id contains a forbidden delimiter character (':' or '/')")]
    ForbiddenCharacter,
}

define_id! {
    /// Identifies a session: an independent event log and run DAG.
    pub struct SessionId;
}

define_id! {
    /// Identifies a run: one top-level workflow execution within a session.
    pub struct RunId;
}

define_id! {
    /// Identifies a node: a materialized point in a run's DAG.
    pub struct NodeId;
}

define_id! {
    /// Identifies an attempt at advancing from a node.
    pub struct AttemptId;
}

define_id! {
    /// Identifies a single durable event.
    pub struct EventId;
}

/// Generates unique, delimiter-safe identifier strings.
pub trait IdGen: Send + Sync {
    fn next(&self) -> String;
}

/// Production id generator backed by UUIDv4.
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic id generator for tests: `<prefix>-<n>` counting up from 1.
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// The canonical digest of a pinned workflow definition: `sha256:<64 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkflowHash(String);

impl WorkflowHash {
    const PREFIX: &'static str = "sha256:";

    /// Compute the hash from canonical bytes (see [`crate::canonical`]).
    pub fn of_canonical_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        Self(format!("{}{:x}", Self::PREFIX, digest))
    }

    pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
        let s = s.into();
        let hex = s
            .strip_prefix(Self::PREFIX)
            .ok_or(IdError::ForbiddenCharacter)?;
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::ForbiddenCharacter);
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short, deterministic, size-bounding reference used inside tokens.
    ///
    /// This is NOT a substitute for full equality checking: the token
    /// holder only ever asserts the ref matches; the authoritative
    /// `workflow_hash` on the `run_started` event is what gets compared
    /// for correctness.
    pub fn short_ref(&self) -> String {
        self.0
            .strip_prefix(Self::PREFIX)
            .unwrap_or(&self.0)
            .chars()
            .take(16)
            .collect()
    }
}

impl fmt::Display for WorkflowHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
