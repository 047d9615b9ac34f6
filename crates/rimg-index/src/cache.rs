//! Single-slot, TTL-bounded cache of the persisted index snapshot.
//!
//! The cache never rebuilds: on expiry it re-reads the snapshot the builder
//! last persisted. Concurrent readers that all find the slot stale each
//! reload; the reads are idempotent, so there is no reload lock and the slot
//! lock is never held across a backend call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use rimg_store::ObjectStore;

use crate::clock::Clock;
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::snapshot;
use crate::tree::IndexTree;

/// A loaded snapshot and the moment it was loaded.
#[derive(Clone, Debug)]
pub struct CachedIndex {
    pub tree: Arc<IndexTree>,
    pub loaded_at: DateTime<Utc>,
}

impl CachedIndex {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.loaded_at < ttl
    }
}

/// In-process copy of the snapshot with a fixed freshness window.
pub struct IndexCache {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    snapshot_key: String,
    ttl: TimeDelta,
    slot: RwLock<Option<CachedIndex>>,
    reloads: AtomicU64,
}

impl std::fmt::Debug for IndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCache")
            .field("snapshot_key", &self.snapshot_key)
            .field("ttl", &self.ttl)
            .field("loaded_at", &self.loaded_at())
            .finish()
    }
}

impl IndexCache {
    /// Create an empty (unloaded) cache.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: &IndexConfig,
    ) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            snapshot_key: config.snapshot_key.clone(),
            ttl: config.ttl()?,
            slot: RwLock::new(None),
            reloads: AtomicU64::new(0),
        })
    }

    /// The current tree, reloading it if the slot is empty or stale.
    pub async fn get(&self) -> IndexResult<Arc<IndexTree>> {
        self.get_at(self.clock.now()).await
    }

    /// [`get`](Self::get) with an explicit notion of "now".
    pub async fn get_at(&self, now: DateTime<Utc>) -> IndexResult<Arc<IndexTree>> {
        if let Some(tree) = self.fresh(now) {
            return Ok(tree);
        }

        let tree = Arc::new(self.load().await?);
        self.reloads.fetch_add(1, Ordering::Relaxed);
        *self.slot.write().expect("lock poisoned") = Some(CachedIndex {
            tree: Arc::clone(&tree),
            loaded_at: now,
        });
        tracing::debug!(snapshot = %self.snapshot_key, leaves = tree.leaf_count(), "index cache reloaded");
        Ok(tree)
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<IndexTree>> {
        let slot = self.slot.read().expect("lock poisoned");
        slot.as_ref()
            .filter(|cached| cached.is_fresh(now, self.ttl))
            .map(|cached| Arc::clone(&cached.tree))
    }

    async fn load(&self) -> IndexResult<IndexTree> {
        let object = self
            .store
            .get(&self.snapshot_key)
            .await
            .map_err(IndexError::SnapshotRead)?
            .ok_or_else(|| IndexError::SnapshotMissing(self.snapshot_key.clone()))?;
        snapshot::decode(&self.snapshot_key, &object.data).inspect_err(|e| {
            tracing::warn!(error = %e, "index snapshot failed to parse");
        })
    }

    /// Drop the cached tree; the next `get` reloads.
    pub fn invalidate(&self) {
        *self.slot.write().expect("lock poisoned") = None;
    }

    /// When the cached tree was loaded, if there is one.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.slot
            .read()
            .expect("lock poisoned")
            .as_ref()
            .map(|cached| cached.loaded_at)
    }

    /// The cached entry, fresh or not, without touching the store.
    pub fn peek(&self) -> Option<CachedIndex> {
        self.slot.read().expect("lock poisoned").clone()
    }

    /// Number of successful snapshot loads so far.
    pub fn reloads(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rimg_store::InMemoryObjectStore;

    use super::*;
    use crate::clock::ManualClock;
    use crate::selector::flatten;

    struct Fixture {
        store: Arc<InMemoryObjectStore>,
        clock: Arc<ManualClock>,
        cache: IndexCache,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryObjectStore::new());
        let clock = Arc::new(ManualClock::default());
        let cache = IndexCache::new(store.clone(), clock.clone(), &IndexConfig::default()).unwrap();
        Fixture { store, clock, cache }
    }

    async fn write_snapshot(store: &InMemoryObjectStore, json: &'static str) {
        store
            .put("list.json", Bytes::from_static(json.as_bytes()), "application/json")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_snapshot_is_an_error_not_an_empty_tree() {
        let f = fixture();
        let err = f.cache.get().await.unwrap_err();
        assert!(matches!(err, IndexError::SnapshotMissing(k) if k == "list.json"));
        assert!(f.cache.peek().is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_surfaced() {
        let f = fixture();
        write_snapshot(&f.store, "{not json").await;
        assert!(matches!(f.cache.get().await, Err(IndexError::SnapshotCorrupt { .. })));
        assert!(f.cache.peek().is_none());
    }

    #[tokio::test]
    async fn within_ttl_serves_same_tree_without_reading() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t"}"#).await;

        let first = f.cache.get().await.unwrap();
        f.clock.advance(TimeDelta::minutes(59));
        let second = f.cache.get().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.store.get_calls(), 1);
        assert_eq!(f.cache.reloads(), 1);
    }

    #[tokio::test]
    async fn after_ttl_reloads_updated_snapshot() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t"}"#).await;
        f.cache.get().await.unwrap();

        write_snapshot(&f.store, r#"{"b.jpg": "t"}"#).await;
        f.clock.advance(TimeDelta::minutes(30));
        let stale_ok = f.cache.get().await.unwrap();
        assert_eq!(flatten(&stale_ok, None).unwrap(), vec!["a.jpg"]);

        f.clock.advance(TimeDelta::minutes(30));
        let fresh = f.cache.get().await.unwrap();
        assert_eq!(flatten(&fresh, None).unwrap(), vec!["b.jpg"]);
        assert_eq!(f.store.get_calls(), 2);
        assert_eq!(f.cache.loaded_at(), Some(f.clock.now()));
    }

    #[tokio::test]
    async fn expiry_with_deleted_snapshot_does_not_fall_back_to_stale() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t"}"#).await;
        f.cache.get().await.unwrap();

        f.store.remove("list.json");
        f.clock.advance(TimeDelta::hours(2));
        assert!(matches!(f.cache.get().await, Err(IndexError::SnapshotMissing(_))));
    }

    #[tokio::test]
    async fn get_at_uses_supplied_time() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t"}"#).await;
        let t0 = DateTime::from_timestamp(10_000, 0).unwrap();
        f.cache.get_at(t0).await.unwrap();
        f.cache.get_at(t0 + TimeDelta::seconds(3599)).await.unwrap();
        assert_eq!(f.store.get_calls(), 1);
        f.cache.get_at(t0 + TimeDelta::seconds(3600)).await.unwrap();
        assert_eq!(f.store.get_calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t"}"#).await;
        f.cache.get().await.unwrap();
        f.cache.invalidate();
        assert!(f.cache.loaded_at().is_none());
        f.cache.get().await.unwrap();
        assert_eq!(f.store.get_calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_stale_readers_all_succeed() {
        let f = fixture();
        write_snapshot(&f.store, r#"{"a.jpg": "t", "b": {"c.png": "t"}}"#).await;
        let cache = Arc::new(f.cache);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await.map(|t| t.leaf_count()) })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 2);
        }
        let reads = f.store.get_calls();
        assert!((1..=8).contains(&reads), "unexpected read count {reads}");
    }

    #[test]
    fn rejects_invalid_config() {
        let config = IndexConfig {
            ttl_secs: 0,
            ..Default::default()
        };
        let err = IndexCache::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(ManualClock::default()),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }
}
