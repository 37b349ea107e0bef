//! Resolve semantics: hits, forced regeneration, input validation, the
//! storage partial-failure policy, and the administrative surface.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::StubGenerator;
use harvest::{PatternKey, ResolveError, RoutineCache};
use harvest_core::CacheEntry;
use harvest_store::{DeleteStatus, EntryStore, FsEntryStore, StoreError, StoreResult};
use tempfile::TempDir;

const MARKUP: &str = "<html><body>page</body></html>";

fn cache_with(
    dir: &TempDir,
    generator: Arc<StubGenerator>,
) -> RoutineCache<Arc<StubGenerator>> {
    let store = FsEntryStore::builder().path(dir.path()).build().unwrap();
    RoutineCache::builder(generator).store(store).build().unwrap()
}

#[tokio::test]
async fn cache_hit_skips_generation() {
    let dir = TempDir::new().unwrap();

    let first = StubGenerator::new();
    let cache = cache_with(&dir, first.clone());
    let miss = cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    assert!(!miss.cache_hit());
    assert_eq!(first.calls(), 1);

    // Fresh coordinator over the same store, with a generator that must
    // not run: the entry comes back from disk.
    let second = StubGenerator::new();
    let cache = cache_with(&dir, second.clone());
    let hit = cache
        .resolve("https://example.com/users/456", MARKUP, false)
        .await
        .unwrap();
    assert!(hit.cache_hit());
    assert_eq!(hit.payload(), miss.payload());
    assert_eq!(hit.created_at(), miss.created_at());
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn forced_regeneration_replaces_the_entry() {
    let dir = TempDir::new().unwrap();
    let generator = StubGenerator::new();
    let cache = cache_with(&dir, generator.clone());

    let first = cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    let second = cache
        .resolve("https://example.com/users/123", MARKUP, true)
        .await
        .unwrap();

    assert_eq!(generator.calls(), 2);
    assert!(!second.cache_hit());
    assert_ne!(first.payload(), second.payload());

    // Last write wins: the store holds the regenerated routine.
    let key = cache.pattern("https://example.com/users/123");
    let stored = cache.entry(&key).await.unwrap().unwrap();
    assert_eq!(stored.payload(), second.payload());
    assert_eq!(cache.count().await.unwrap(), 1);
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let generator = StubGenerator::new();
    let cache = cache_with(&dir, generator.clone());

    let error = cache.resolve("", MARKUP, false).await.unwrap_err();
    assert!(matches!(error, ResolveError::Input(_)));

    let error = cache
        .resolve("https://example.com", "   ", false)
        .await
        .unwrap_err();
    assert!(matches!(error, ResolveError::Input(_)));

    assert_eq!(generator.calls(), 0);
    assert_eq!(cache.count().await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_url_still_resolves_under_a_degraded_key() {
    let dir = TempDir::new().unwrap();
    let generator = StubGenerator::new();
    let cache = cache_with(&dir, generator.clone());

    let resolution = cache.resolve("ht tp://not a url", MARKUP, false).await.unwrap();
    assert!(!resolution.cache_hit());
    assert_eq!(cache.pattern("ht tp://not a url").as_str(), "ht tp://not a url");

    // The degraded key is a valid cache key like any other.
    let again = cache.resolve("ht tp://not a url", MARKUP, false).await.unwrap();
    assert!(again.cache_hit());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn admin_surface_lists_and_deletes() {
    let dir = TempDir::new().unwrap();
    let generator = StubGenerator::new();
    let cache = cache_with(&dir, generator.clone());

    cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    cache
        .resolve("https://other.example.com/posts/my-awesome-post", MARKUP, false)
        .await
        .unwrap();

    assert_eq!(cache.count().await.unwrap(), 2);
    assert_eq!(cache.entries(None).await.unwrap().len(), 2);
    assert_eq!(cache.entries(Some(1)).await.unwrap().len(), 1);

    let key = cache.pattern("https://example.com/users/999");
    assert_eq!(key.as_str(), "example.com/users/{id}");
    assert!(cache.delete(&key).await.unwrap());
    assert!(!cache.delete(&key).await.unwrap());
    assert_eq!(cache.count().await.unwrap(), 1);

    // Deleted key misses again and regenerates on the next resolve.
    let resolution = cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    assert!(!resolution.cache_hit());
}

/// Store whose writes always fail; reads delegate to the real store.
#[derive(Clone)]
struct WriteFailingStore {
    inner: FsEntryStore,
}

#[async_trait]
impl EntryStore for WriteFailingStore {
    async fn get(&self, key: &PatternKey) -> StoreResult<Option<CacheEntry>> {
        self.inner.get(key).await
    }

    async fn set(&self, _entry: &CacheEntry) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn delete(&self, key: &PatternKey) -> StoreResult<DeleteStatus> {
        self.inner.delete(key).await
    }

    async fn list(&self, limit: Option<usize>) -> StoreResult<Vec<CacheEntry>> {
        self.inner.list(limit).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn storage_failure_still_returns_the_payload() {
    let dir = TempDir::new().unwrap();
    let generator = StubGenerator::new();
    let store = WriteFailingStore {
        inner: FsEntryStore::builder().path(dir.path()).build().unwrap(),
    };
    let cache = RoutineCache::builder(generator.clone())
        .store(store)
        .build()
        .unwrap();

    // The generation wasn't wasted: the caller gets a usable routine even
    // though persisting it failed.
    let resolution = cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    assert_eq!(resolution.payload().as_bytes(), b"routine-0");
    assert_eq!(cache.count().await.unwrap(), 0);

    // Not durably cached: the next request regenerates.
    let again = cache
        .resolve("https://example.com/users/123", MARKUP, false)
        .await
        .unwrap();
    assert!(!again.cache_hit());
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn missing_store_fails_the_builder() {
    let error = RoutineCache::builder(StubGenerator::new()).build().unwrap_err();
    assert!(error.to_string().contains("store"));
}
