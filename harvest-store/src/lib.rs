#![warn(missing_docs)]
//! # harvest-store
//!
//! Persistent entry storage for the Harvest extraction-routine cache.
//!
//! Defines the [`EntryStore`] trait consumed by the coordinator in the
//! `harvest` crate, plus [`FsEntryStore`], a file-backed implementation
//! that keeps one JSON record per pattern key. Record names are a
//! deterministic, filesystem-safe sanitization of the key, so no shared
//! index is needed and per-key operations are independent.

mod error;
mod store;

pub use error::StoreError;
pub use store::{DeleteStatus, EntryStore, FsEntryStore, FsEntryStoreBuilder, StoreResult, sanitize_key};
