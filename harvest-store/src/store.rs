//! Entry store trait and the file-system implementation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use harvest_core::{CacheEntry, PatternKey, Routine};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a delete operation.
///
/// Deleting a key that was never stored is a normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// The record existed and was removed.
    Deleted,
    /// No record existed for the key.
    Missing,
}

/// Durable key→entry storage.
///
/// One record per [`PatternKey`]; a new entry for an existing key replaces
/// the previous one (last-write-wins). Reads and writes for different keys
/// are independent.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Reads the entry for a key, if one exists.
    async fn get(&self, key: &PatternKey) -> StoreResult<Option<CacheEntry>>;

    /// Persists an entry, replacing any previous record for its key.
    async fn set(&self, entry: &CacheEntry) -> StoreResult<()>;

    /// Removes the record for a key.
    async fn delete(&self, key: &PatternKey) -> StoreResult<DeleteStatus>;

    /// Lists stored entries, newest first.
    ///
    /// Records that fail to deserialize are skipped, never failing the
    /// whole listing. `limit` caps the number of returned entries.
    async fn list(&self, limit: Option<usize>) -> StoreResult<Vec<CacheEntry>>;

    /// Number of stored records.
    async fn count(&self) -> StoreResult<usize>;
}

#[async_trait]
impl EntryStore for Arc<dyn EntryStore> {
    async fn get(&self, key: &PatternKey) -> StoreResult<Option<CacheEntry>> {
        (**self).get(key).await
    }

    async fn set(&self, entry: &CacheEntry) -> StoreResult<()> {
        (**self).set(entry).await
    }

    async fn delete(&self, key: &PatternKey) -> StoreResult<DeleteStatus> {
        (**self).delete(key).await
    }

    async fn list(&self, limit: Option<usize>) -> StoreResult<Vec<CacheEntry>> {
        (**self).list(limit).await
    }

    async fn count(&self) -> StoreResult<usize> {
        (**self).count().await
    }
}

/// On-disk record shape: `{ key, payload, created_at }` as JSON, with an
/// RFC 3339 timestamp. The literal key is stored inside the record because
/// the filename is a lossy sanitization of it.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl From<&CacheEntry> for StoredRecord {
    fn from(entry: &CacheEntry) -> Self {
        StoredRecord {
            key: entry.key().as_str().to_owned(),
            payload: entry.payload().as_bytes().to_vec(),
            created_at: entry.created_at(),
        }
    }
}

impl From<StoredRecord> for CacheEntry {
    fn from(record: StoredRecord) -> Self {
        CacheEntry::from_parts(
            PatternKey::new(record.key),
            Routine::from(record.payload),
            record.created_at,
        )
    }
}

const RECORD_EXTENSION: &str = "json";

/// Maps a pattern key to a filesystem-safe record name.
///
/// Characters outside `[A-Za-z0-9.-]` become `_`, runs of `_` collapse to
/// one, and leading/trailing separators are trimmed. Distinct keys can
/// sanitize to the same name (`a/b` vs `a_b`); that collision is accepted
/// and the literal key inside the record is authoritative.
pub fn sanitize_key(key: &PatternKey) -> String {
    let mut name = String::with_capacity(key.as_str().len());
    let mut last_was_separator = false;
    for c in key.as_str().chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            name.push(c);
            last_was_separator = false;
        } else if !last_was_separator {
            name.push('_');
            last_was_separator = true;
        }
    }
    let trimmed = name.trim_matches('_');
    if trimmed.is_empty() {
        "_".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Inner state shared across clones.
#[derive(Debug)]
struct FsInner {
    root: PathBuf,
}

/// File-backed [`EntryStore`]: one JSON record file per key.
///
/// The record name is derived deterministically from the key on every
/// access, so no shared index structure exists and operations on different
/// keys never contend. Writes go through a temp file and rename so a
/// record is either the old version or the new one, never a torn write.
///
/// ```no_run
/// use harvest_store::FsEntryStore;
///
/// let store = FsEntryStore::builder()
///     .path("/var/cache/harvest")
///     .build()?;
/// # Ok::<(), harvest_store::StoreError>(())
/// ```
///
/// Cloning is cheap — clones share the same root directory.
#[derive(Debug, Clone)]
pub struct FsEntryStore {
    inner: Arc<FsInner>,
}

impl FsEntryStore {
    /// Starts building a new store.
    pub fn builder() -> FsEntryStoreBuilder {
        FsEntryStoreBuilder::default()
    }

    fn record_path(&self, key: &PatternKey) -> PathBuf {
        self.inner
            .root
            .join(format!("{}.{RECORD_EXTENSION}", sanitize_key(key)))
    }
}

/// Builder for [`FsEntryStore`].
#[derive(Debug, Default)]
pub struct FsEntryStoreBuilder {
    path: Option<PathBuf>,
}

impl FsEntryStoreBuilder {
    /// Root directory for record files. Created if it doesn't exist.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Creates the store.
    ///
    /// Fails if the root directory can't be created.
    pub fn build(self) -> Result<FsEntryStore, StoreError> {
        let root = self.path.unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&root)?;
        Ok(FsEntryStore {
            inner: Arc::new(FsInner { root }),
        })
    }
}

#[async_trait]
impl EntryStore for FsEntryStore {
    async fn get(&self, key: &PatternKey) -> StoreResult<Option<CacheEntry>> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: StoredRecord = serde_json::from_slice(&bytes)?;
        Ok(Some(record.into()))
    }

    async fn set(&self, entry: &CacheEntry) -> StoreResult<()> {
        let path = self.record_path(entry.key());
        let record = StoredRecord::from(entry);
        let bytes = serde_json::to_vec(&record)?;

        // Temp file + rename keeps concurrent readers off half-written
        // records; rename is last-write-wins for concurrent writers.
        let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &PatternKey) -> StoreResult<DeleteStatus> {
        let path = self.record_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(DeleteStatus::Deleted),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteStatus::Missing),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, limit: Option<usize>) -> StoreResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.inner.root).await?;
        while let Some(dir_entry) = dir.next_entry().await? {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(?path, error = %e, "skipping unreadable record");
                    continue;
                }
            };
            match serde_json::from_slice::<StoredRecord>(&bytes) {
                Ok(record) => entries.push(CacheEntry::from(record)),
                Err(e) => {
                    warn!(?path, error = %e, "skipping corrupt record");
                }
            }
        }
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at()));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn count(&self) -> StoreResult<usize> {
        let mut count = 0;
        let mut dir = tokio::fs::read_dir(&self.inner.root).await?;
        while let Some(dir_entry) = dir.next_entry().await? {
            if dir_entry.path().extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FsEntryStore {
        FsEntryStore::builder().path(dir.path()).build().unwrap()
    }

    fn entry(key: &str, payload: &str) -> CacheEntry {
        CacheEntry::new(PatternKey::new(key), Routine::new(payload.as_bytes().to_vec()))
    }

    #[test]
    fn sanitize_replaces_collapses_and_trims() {
        let s = |k: &str| sanitize_key(&PatternKey::new(k));
        assert_eq!(s("example.com/users/{id}"), "example.com_users_id");
        assert_eq!(s("///a///b///"), "a_b");
        assert_eq!(s("a.b-c"), "a.b-c");
        assert_eq!(s(""), "_");
        assert_eq!(s("{}"), "_");
    }

    #[tokio::test]
    async fn write_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let e = entry("example.com/users/{id}", "routine-source");
        store.set(&e).await.unwrap();

        let read = store.get(e.key()).await.unwrap().expect("entry should exist");
        assert_eq!(read, e);
    }

    #[tokio::test]
    async fn read_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let missing = store.get(&PatternKey::new("nothing.example")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let key = PatternKey::new("example.com/posts/{id}");

        store
            .set(&CacheEntry::new(key.clone(), Routine::from("v1")))
            .await
            .unwrap();
        store
            .set(&CacheEntry::new(key.clone(), Routine::from("v2")))
            .await
            .unwrap();

        let read = store.get(&key).await.unwrap().unwrap();
        assert_eq!(read.payload().as_bytes(), b"v2");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_existing_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let e = entry("example.com/about", "routine");
        store.set(&e).await.unwrap();

        assert_eq!(store.delete(e.key()).await.unwrap(), DeleteStatus::Deleted);
        assert_eq!(store.delete(e.key()).await.unwrap(), DeleteStatus::Missing);
        assert!(store.get(e.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_corrupt_records() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for i in 0..3 {
            store.set(&entry(&format!("site{i}.example/{{id}}"), "r")).await.unwrap();
        }
        std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();

        let listed = store.list(None).await.unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let old = CacheEntry::from_parts(
            PatternKey::new("old.example"),
            Routine::from("old"),
            Utc::now() - chrono::Duration::hours(2),
        );
        let new = CacheEntry::from_parts(
            PatternKey::new("new.example"),
            Routine::from("new"),
            Utc::now(),
        );
        store.set(&old).await.unwrap();
        store.set(&new).await.unwrap();

        let listed = store.list(None).await.unwrap();
        assert_eq!(listed[0].key().as_str(), "new.example");
        assert_eq!(listed[1].key().as_str(), "old.example");

        let limited = store.list(Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].key().as_str(), "new.example");
    }

    #[tokio::test]
    async fn count_counts_records_only() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.set(&entry("a.example", "r")).await.unwrap();
        store.set(&entry("b.example", "r")).await.unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"ignored").unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sanitize_collision_is_last_write_wins() {
        // `a/b` and `a_b` share a record name; the second write replaces
        // the first. Documented as accepted, not fixed.
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .set(&CacheEntry::new(PatternKey::new("a/b"), Routine::from("slash")))
            .await
            .unwrap();
        store
            .set(&CacheEntry::new(PatternKey::new("a_b"), Routine::from("under")))
            .await
            .unwrap();

        let read = store.get(&PatternKey::new("a/b")).await.unwrap().unwrap();
        assert_eq!(read.key().as_str(), "a_b");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clone_shares_the_root() {
        let dir = TempDir::new().unwrap();
        let store1 = store(&dir);
        let store2 = store1.clone();

        let e = entry("shared.example/{id}", "routine");
        store1.set(&e).await.unwrap();
        assert!(store2.get(e.key()).await.unwrap().is_some());
    }
}
