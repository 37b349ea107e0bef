//! The routine-generation capability.
//!
//! Generation is the expensive operation the whole cache exists to
//! amortize: an external backend receives a URL and the raw page markup
//! and returns executable extraction logic. Expected latency is seconds,
//! dominated by a network call. The coordinator treats generation as
//! at-most-once per coalesced batch and never retries internally.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::entry::Routine;

/// Error produced by a failed generation attempt.
///
/// Propagated verbatim to every coalesced waiter of the failed batch. The
/// next call for the same key is free to retry; nothing is cached on
/// failure.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The generation backend could not be reached or failed internally.
    #[error("generation backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The backend processed the page but declined to produce a routine.
    #[error("generation rejected: {0}")]
    Rejected(String),
}

impl GenerateError {
    /// Wraps an arbitrary backend failure.
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        GenerateError::Backend(Box::new(error))
    }
}

/// Capability trait for obtaining a fresh extraction routine.
///
/// Implementations call out to the generation backend (an LLM-style
/// service). The returned [`Routine`] is opaque to the cache layer.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates an extraction routine for the given page.
    ///
    /// `url` is the concrete page URL (not the derived pattern) and
    /// `markup` is the raw page markup the routine should be built
    /// against.
    async fn generate(&self, url: &str, markup: &str) -> Result<Routine, GenerateError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, url: &str, markup: &str) -> Result<Routine, GenerateError> {
        (**self).generate(url, markup).await
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Box<G> {
    async fn generate(&self, url: &str, markup: &str) -> Result<Routine, GenerateError> {
        (**self).generate(url, markup).await
    }
}
