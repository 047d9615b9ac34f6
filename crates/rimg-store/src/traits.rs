use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreResult;
use crate::object::{ListPage, StoredObject};

/// Key-addressed object store with paginated listing.
///
/// All implementations must satisfy these invariants:
/// - `list` returns entries in ascending key order. Following `next_cursor`
///   until it is `None` visits every key matching `prefix` exactly once.
/// - `put` replaces the whole object; the last writer wins.
/// - A missing key is `Ok(None)` from `get`, never an error.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys starting with `prefix`, resuming after `cursor`.
    async fn list(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage>;

    /// Read an object by key.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// Write (create or replace) an object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StoreResult<()>;

    /// Check whether an object exists.
    ///
    /// Default implementation calls `get()`. Backends may override to avoid
    /// reading the body.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
