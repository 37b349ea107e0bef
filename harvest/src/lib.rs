#![warn(missing_docs)]
//! # harvest
//!
//! Coalescing cache for generated web-page extraction routines.
//!
//! Harvest turns an arbitrary web page into structured data by reusing a
//! previously generated extraction routine whenever the page's URL matches
//! a pattern seen before, and otherwise obtaining a new routine from an
//! external generation backend. The expensive part is generation (an
//! LLM-style call measured in seconds), so the cache guarantees that
//! concurrent requests for the same pattern trigger **at most one**
//! generation, with the result persisted and fanned out to every waiter.
//!
//! - [`RoutineCache`] — the coordinator: `resolve(url, markup, force)` and
//!   single-flight [`get_or_create`](RoutineCache::get_or_create)
//! - pattern derivation lives in [`harvest_core`]
//! - persistent storage lives in [`harvest_store`]
//!
//! Out of scope by design: the HTTP layer, sandboxed execution of the
//! generated routines, and the generation backend itself (injected via the
//! [`Generator`] trait).

/// The coalescing cache coordinator and its supporting types.
pub mod coordinator;

/// Error types for cache resolution.
///
/// Defines [`ResolveError`] which covers:
/// - Invalid caller input (rejected before the cache path)
/// - Generation failures (fanned out to every coalesced waiter)
pub mod error;

pub use coordinator::{
    CacheStatus, GetOrCreateOptions, Resolution, RoutineCache, RoutineCacheBuilder,
};
pub use error::{BuildError, ResolveError};

pub use harvest_core::{
    CacheEntry, Dictionary, GenerateError, Generator, PatternBuilder, PatternKey, Routine,
    SegmentKind, StaticDictionary, classify,
};
pub use harvest_store::{DeleteStatus, EntryStore, FsEntryStore, StoreError};
