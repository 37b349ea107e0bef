//! The coalescing cache coordinator.
//!
//! [`RoutineCache`] wraps the persistent [`EntryStore`] with an in-memory
//! in-flight table to provide single-flight "get-or-generate" semantics:
//! for any key, at most one generation call runs at a time, and every
//! caller that arrives while it runs receives the same outcome.
//!
//! The in-flight table is process-local and never persisted. A crash
//! mid-generation loses only the in-flight state; the next request for
//! the key simply regenerates.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use harvest_core::{
    CacheEntry, Dictionary, GenerateError, Generator, PatternBuilder, PatternKey, Routine,
    StaticDictionary,
};
use harvest_store::{DeleteStatus, EntryStore, StoreError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{BuildError, ResolveError};

type FlightResult = Result<CacheEntry, ResolveError>;

/// Where a resolved entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the persistent store without generation.
    Hit,
    /// Freshly generated (or received from a coalesced generation).
    Miss,
}

/// Options for [`RoutineCache::get_or_create`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOrCreateOptions {
    /// Skip the persistent-store read and force a generation.
    ///
    /// Coalescing still applies: a forced request joins an already-running
    /// generation for the same key rather than starting a second one.
    pub skip_cache_read: bool,
}

/// Result of resolving a page: the routine payload plus cache metadata.
#[derive(Debug, Clone)]
pub struct Resolution {
    payload: Routine,
    created_at: DateTime<Utc>,
    cache_hit: bool,
}

impl Resolution {
    /// The extraction routine for the page's pattern.
    pub fn payload(&self) -> &Routine {
        &self.payload
    }

    /// When the routine was generated.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `true` if the routine was served from the persistent store.
    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }

    /// Consumes the resolution, returning the routine payload.
    pub fn into_payload(self) -> Routine {
        self.payload
    }
}

/// State shared between the coordinator and its spawned flight tasks.
struct FlightTable {
    store: Arc<dyn EntryStore>,
    flights: DashMap<PatternKey, broadcast::Sender<FlightResult>>,
}

/// Removes the in-flight registration when the flight ends, even if the
/// generation future panics. A leaked registration would pin every future
/// caller of the key to a dead channel.
struct FlightGuard {
    table: Arc<FlightTable>,
    key: PatternKey,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.table.flights.remove(&self.key);
    }
}

async fn run_flight<Fut>(
    table: Arc<FlightTable>,
    key: PatternKey,
    tx: broadcast::Sender<FlightResult>,
    generation: Fut,
) where
    Fut: Future<Output = Result<Routine, GenerateError>> + Send,
{
    let guard = FlightGuard {
        table: Arc::clone(&table),
        key: key.clone(),
    };

    let result = match generation.await {
        Ok(routine) => {
            let entry = CacheEntry::new(key.clone(), routine);
            if let Err(e) = table.store.set(&entry).await {
                // Deliberate partial-failure policy: the generated routine
                // is still returned to every waiter, it just isn't durably
                // cached. The next request for this key regenerates.
                warn!(key = %key, error = %e, "failed to persist generated routine");
            }
            Ok(entry)
        }
        Err(e) => {
            debug!(key = %key, error = %e, "generation failed");
            Err(ResolveError::from(e))
        }
    };

    // Deregister before broadcasting: anyone who finds no in-flight entry
    // from here on starts a fresh flight instead of waiting on a channel
    // that already fired.
    drop(guard);
    let _ = tx.send(result);
}

/// Coalescing cache for generated extraction routines.
///
/// Construction wires together the three injected capabilities:
///
/// - an [`EntryStore`] for durable key→entry records
/// - a [`Generator`] that produces a routine from (url, markup)
/// - a [`Dictionary`] used when deriving pattern keys from URLs
///
/// ```no_run
/// use harvest::RoutineCache;
/// use harvest_store::FsEntryStore;
/// # use harvest_core::{Generator, GenerateError, Routine};
/// # struct LlmGenerator;
/// # #[async_trait::async_trait]
/// # impl Generator for LlmGenerator {
/// #     async fn generate(&self, _: &str, _: &str) -> Result<Routine, GenerateError> {
/// #         Ok(Routine::from("fn extract() {}"))
/// #     }
/// # }
/// # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FsEntryStore::builder().path("/var/cache/harvest").build()?;
/// let cache = RoutineCache::builder(LlmGenerator).store(store).build()?;
///
/// let resolution = cache.resolve("https://example.com/users/42", "<html>...</html>", false).await?;
/// println!("hit: {}", resolution.cache_hit());
/// # Ok(()) }
/// ```
///
/// Cloning is cheap — clones share the store, the generator and the
/// in-flight table, so coalescing works across clones.
pub struct RoutineCache<G> {
    table: Arc<FlightTable>,
    builder: PatternBuilder,
    generator: Arc<G>,
}

impl<G> std::fmt::Debug for RoutineCache<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineCache").finish_non_exhaustive()
    }
}

impl<G> Clone for RoutineCache<G> {
    fn clone(&self) -> Self {
        RoutineCache {
            table: Arc::clone(&self.table),
            builder: self.builder.clone(),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<G> RoutineCache<G>
where
    G: Generator + 'static,
{
    /// Starts building a cache around the given generator.
    pub fn builder(generator: G) -> RoutineCacheBuilder<G> {
        RoutineCacheBuilder {
            generator,
            store: None,
            dictionary: None,
        }
    }

    /// Derives the cache key a URL would resolve under.
    pub fn pattern(&self, url: &str) -> PatternKey {
        self.builder.build(url)
    }

    /// Resolves a page to its extraction routine.
    ///
    /// Validates inputs, derives the pattern key and delegates to
    /// [`get_or_create`](Self::get_or_create). `force_regenerate` skips the
    /// persistent-store read but still joins an in-flight generation for
    /// the same key.
    pub async fn resolve(
        &self,
        url: &str,
        markup: &str,
        force_regenerate: bool,
    ) -> Result<Resolution, ResolveError> {
        if url.trim().is_empty() {
            return Err(ResolveError::Input("url must not be empty"));
        }
        if markup.trim().is_empty() {
            return Err(ResolveError::Input("markup must not be empty"));
        }

        let key = self.builder.build(url);
        let generator = Arc::clone(&self.generator);
        let url = url.to_owned();
        let markup = markup.to_owned();

        let (entry, status) = self
            .get_or_create(
                key,
                GetOrCreateOptions {
                    skip_cache_read: force_regenerate,
                },
                move || async move { generator.generate(&url, &markup).await },
            )
            .await?;

        let (_, payload, created_at) = entry.into_parts();
        Ok(Resolution {
            payload,
            created_at,
            cache_hit: status == CacheStatus::Hit,
        })
    }

    /// Returns the cached entry for `key`, or runs exactly one generation.
    ///
    /// `generate` is invoked at most once per coalesced batch: callers
    /// that arrive while a generation for `key` is in flight await that
    /// same outcome instead of generating again. Generation failures are
    /// propagated to every waiter and are never retried internally; the
    /// in-flight registration is cleared so a subsequent call retries.
    ///
    /// A successful generation is persisted before being fanned out. If
    /// persisting fails, the entry is still returned (logged, not
    /// surfaced) — it just won't be served from cache next time.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: PatternKey,
        options: GetOrCreateOptions,
        generate: F,
    ) -> Result<(CacheEntry, CacheStatus), ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Routine, GenerateError>> + Send + 'static,
    {
        if !options.skip_cache_read {
            match self.table.store.get(&key).await {
                Ok(Some(entry)) => {
                    debug!(key = %key, "cache hit");
                    return Ok((entry, CacheStatus::Hit));
                }
                Ok(None) => {}
                Err(e) => {
                    // A read failure degrades to a miss: generation can
                    // still produce a usable result for the caller.
                    warn!(key = %key, error = %e, "cache read failed, treating as miss");
                }
            }
        }

        // Subscribe or register under the shard lock, without awaiting, so
        // a flight's completion can't slip between the check and the
        // subscription.
        let mut receiver = match self.table.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                debug!(key = %key, "joining in-flight generation");
                occupied.get().subscribe()
            }
            Entry::Vacant(vacant) => {
                debug!(key = %key, "starting generation");
                let (tx, rx) = broadcast::channel(1);
                vacant.insert(tx.clone());
                tokio::spawn(run_flight(
                    Arc::clone(&self.table),
                    key,
                    tx,
                    generate(),
                ));
                rx
            }
        };

        match receiver.recv().await {
            Ok(result) => result.map(|entry| (entry, CacheStatus::Miss)),
            Err(_) => Err(ResolveError::Aborted),
        }
    }

    /// Reads the stored entry for a key without triggering generation.
    pub async fn entry(&self, key: &PatternKey) -> Result<Option<CacheEntry>, StoreError> {
        self.table.store.get(key).await
    }

    /// Deletes the stored entry for a key.
    ///
    /// Returns `false` if no entry existed; this is not an error.
    pub async fn delete(&self, key: &PatternKey) -> Result<bool, StoreError> {
        let status = self.table.store.delete(key).await?;
        Ok(status == DeleteStatus::Deleted)
    }

    /// Lists stored entries, newest first, up to `limit`.
    pub async fn entries(&self, limit: Option<usize>) -> Result<Vec<CacheEntry>, StoreError> {
        self.table.store.list(limit).await
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.table.store.count().await
    }

    /// Number of generations currently in flight. Mostly useful in tests.
    pub fn in_flight(&self) -> usize {
        self.table.flights.len()
    }
}

/// Builder for [`RoutineCache`].
pub struct RoutineCacheBuilder<G> {
    generator: G,
    store: Option<Arc<dyn EntryStore>>,
    dictionary: Option<Arc<dyn Dictionary>>,
}

impl<G> RoutineCacheBuilder<G>
where
    G: Generator + 'static,
{
    /// The persistent entry store. Required.
    pub fn store(mut self, store: impl EntryStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// The word-likelihood oracle used for pattern derivation.
    ///
    /// Defaults to the embedded [`StaticDictionary`].
    pub fn dictionary(mut self, dictionary: impl Dictionary + 'static) -> Self {
        self.dictionary = Some(Arc::new(dictionary));
        self
    }

    /// Creates the cache.
    ///
    /// Fails if no store was configured.
    pub fn build(self) -> Result<RoutineCache<G>, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let dictionary = self
            .dictionary
            .unwrap_or_else(|| Arc::new(StaticDictionary::embedded()));
        Ok(RoutineCache {
            table: Arc::new(FlightTable {
                store,
                flights: DashMap::new(),
            }),
            builder: PatternBuilder::new(dictionary),
            generator: Arc::new(self.generator),
        })
    }
}
