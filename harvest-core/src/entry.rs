//! Cached entry types.
//!
//! A [`CacheEntry`] is the durable record produced by one successful
//! routine generation: the derived [`PatternKey`], the opaque [`Routine`]
//! payload, and the creation timestamp. Entries are immutable once
//! written; regenerating a key replaces the previous entry wholesale
//! (last-write-wins, no version history).

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::pattern::PatternKey;

/// An opaque generated extraction routine.
///
/// The coordinator never inspects or executes this payload; it is produced
/// by the [`Generator`](crate::Generator) and handed to a sandboxed
/// evaluation collaborator outside this crate. `Bytes` makes cloning a
/// reference-count bump, which matters when one generation result is
/// fanned out to many coalesced waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine(Bytes);

impl Routine {
    /// Wraps raw payload bytes.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Routine(payload.into())
    }

    /// The payload as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the routine, returning the underlying bytes.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Routine {
    fn from(payload: Bytes) -> Self {
        Routine(payload)
    }
}

impl From<Vec<u8>> for Routine {
    fn from(payload: Vec<u8>) -> Self {
        Routine(Bytes::from(payload))
    }
}

impl From<&'static str> for Routine {
    fn from(payload: &'static str) -> Self {
        Routine(Bytes::from_static(payload.as_bytes()))
    }
}

impl From<String> for Routine {
    fn from(payload: String) -> Self {
        Routine(Bytes::from(payload.into_bytes()))
    }
}

/// A durable cache record: one generated routine for one pattern key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    key: PatternKey,
    payload: Routine,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(key: PatternKey, payload: Routine) -> Self {
        Self::from_parts(key, payload, Utc::now())
    }

    /// Reassembles an entry from its stored parts.
    pub fn from_parts(key: PatternKey, payload: Routine, created_at: DateTime<Utc>) -> Self {
        CacheEntry {
            key,
            payload,
            created_at,
        }
    }

    /// The pattern key this entry was generated for.
    pub fn key(&self) -> &PatternKey {
        &self.key
    }

    /// The generated routine payload.
    pub fn payload(&self) -> &Routine {
        &self.payload
    }

    /// When this entry was generated.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Decomposes the entry into its parts.
    pub fn into_parts(self) -> (PatternKey, Routine, DateTime<Utc>) {
        (self.key, self.payload, self.created_at)
    }
}
