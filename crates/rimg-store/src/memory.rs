use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::object::{validate_key, ListPage, ObjectMeta, StoredObject};
use crate::traits::ObjectStore;
use crate::DEFAULT_PAGE_SIZE;

#[derive(Clone, Debug)]
struct Record {
    data: Bytes,
    content_type: Option<String>,
    uploaded: Option<DateTime<Utc>>,
}

/// In-memory, `BTreeMap`-based object store.
///
/// Intended for tests and embedding. Keys are kept sorted so listing is
/// naturally key-ordered; the cursor is the last key of the previous page.
/// Each trait call bumps a counter so callers can assert on backend traffic.
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Record>>,
    page_size: usize,
    list_calls: AtomicU64,
    get_calls: AtomicU64,
    put_calls: AtomicU64,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a new empty store that returns at most `page_size` entries per
    /// listing page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            list_calls: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
            put_calls: AtomicU64::new(0),
        }
    }

    /// Seed an object with an explicit upload time, bypassing the counters.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>, uploaded: Option<DateTime<Utc>>) {
        let key = key.into();
        let record = Record {
            data: data.into(),
            content_type: None,
            uploaded,
        };
        self.objects.write().expect("lock poisoned").insert(key, record);
    }

    /// Remove an object. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.objects.write().expect("lock poisoned").remove(key).is_some()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `get` calls served so far.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Number of `put` calls served so far.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let prefix = prefix.unwrap_or("");
        let map = self.objects.read().expect("lock poisoned");

        let start = match cursor {
            Some(c) if c.is_empty() => return Err(StoreError::InvalidCursor(c.to_string())),
            Some(c) if c >= prefix => Bound::Excluded(c),
            _ => Bound::Included(prefix),
        };

        let mut entries: Vec<ObjectMeta> = map
            .range::<str, _>((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(key, rec)| ObjectMeta::new(key.clone(), rec.data.len() as u64, rec.uploaded))
            .collect();

        let next_cursor = if entries.len() > self.page_size {
            entries.truncate(self.page_size);
            entries.last().map(|meta| meta.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            next_cursor,
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|rec| StoredObject {
            key: key.to_string(),
            data: rec.data.clone(),
            content_type: rec.content_type.clone(),
            uploaded: rec.uploaded,
        }))
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<()> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        validate_key(key)?;
        let record = Record {
            data,
            content_type: Some(content_type.to_string()),
            uploaded: Some(Utc::now()),
        };
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), record);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("page_size", &self.page_size)
            .finish()
    }
}
