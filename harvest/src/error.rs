//! Error types for cache resolution.

use std::sync::Arc;

use harvest_core::GenerateError;
use thiserror::Error;

/// Error type for the caller-facing resolve path.
///
/// `Clone` is required so a single generation failure can be fanned out to
/// every coalesced waiter; the underlying cause is shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The caller's input was rejected before reaching the cache.
    ///
    /// Never cached, never retried internally.
    #[error("invalid input: {0}")]
    Input(&'static str),

    /// Routine generation failed.
    ///
    /// Every waiter of the coalesced batch receives this same error. The
    /// in-flight registration is cleared first, so the next call for the
    /// key will attempt a fresh generation.
    #[error("routine generation failed: {0}")]
    Generation(#[source] Arc<GenerateError>),

    /// The generation task ended without producing a result.
    ///
    /// Only reachable if the generation future panicked; the in-flight
    /// registration is still cleared so subsequent calls can retry.
    #[error("generation aborted before producing a result")]
    Aborted,
}

impl From<GenerateError> for ResolveError {
    fn from(error: GenerateError) -> Self {
        ResolveError::Generation(Arc::new(error))
    }
}

/// Error returned when building a [`RoutineCache`](crate::RoutineCache)
/// with incomplete configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No entry store was configured.
    #[error("entry store not specified. Call .store() before .build()")]
    MissingStore,
}
