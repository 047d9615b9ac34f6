//! Directory-tree object store.
//!
//! Every regular file under `root` is an object whose key is its relative
//! path joined with `/`. Upload time is the file's modification time. The
//! backend keeps no metadata sidecar, so content types are guessed from the
//! key on read.

use std::collections::BinaryHeap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::object::{validate_key, ListPage, ObjectMeta, StoredObject};
use crate::traits::ObjectStore;
use crate::{DEFAULT_PAGE_SIZE, KEY_SEPARATOR};

/// Object store backed by a local directory.
#[derive(Clone, Debug)]
pub struct LocalFsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalFsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the number of entries per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path under `root`, rejecting anything that would
    /// escape it.
    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn key_for(root: &Path, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(root).ok()?;
        let segments: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        let sep = KEY_SEPARATOR.to_string();
        Some(segments?.join(sep.as_str()))
    }

    /// Return the sorted page after `cursor`.
    ///
    /// Directory order does not match key order (`a.jpg` sorts before
    /// `a/b.jpg` but `a` is walked first), so each call still walks the
    /// whole tree. Only the `page_size + 1` smallest keys past the cursor are
    /// retained, and only those are stat'ed, so memory per call is one page
    /// and a full scan costs one walk per page.
    fn list_blocking(
        root: &Path,
        page_size: usize,
        prefix: &str,
        cursor: Option<&str>,
    ) -> StoreResult<ListPage> {
        let keep = page_size.saturating_add(1);
        let mut smallest: BinaryHeap<(String, PathBuf)> = BinaryHeap::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => StoreError::Io(io),
                None => StoreError::Unavailable("filesystem loop while listing".into()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = Self::key_for(root, entry.path()) else {
                tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 path");
                continue;
            };
            if !key.starts_with(prefix) || cursor.is_some_and(|c| key.as_str() <= c) {
                continue;
            }
            if smallest.len() == keep && smallest.peek().is_some_and(|(max, _)| key >= *max) {
                continue;
            }
            smallest.push((key, entry.into_path()));
            if smallest.len() > keep {
                smallest.pop();
            }
        }

        let mut candidates = smallest.into_sorted_vec();
        let next_cursor = if candidates.len() > page_size {
            candidates.truncate(page_size);
            candidates.last().map(|(key, _)| key.clone())
        } else {
            None
        };

        let mut entries = Vec::with_capacity(candidates.len());
        for (key, path) in candidates {
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                // Removed since the walk saw it.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let uploaded = meta.modified().ok().map(DateTime::<Utc>::from);
            entries.push(ObjectMeta::new(key, meta.len(), uploaded));
        }
        Ok(ListPage {
            entries,
            next_cursor,
        })
    }
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn list(&self, prefix: Option<&str>, cursor: Option<&str>) -> StoreResult<ListPage> {
        if let Some(c) = cursor.filter(|c| c.is_empty()) {
            return Err(StoreError::InvalidCursor(c.to_string()));
        }
        let root = self.root.clone();
        let page_size = self.page_size;
        let prefix = prefix.unwrap_or("").to_string();
        let cursor = cursor.map(str::to_string);
        tokio::task::spawn_blocking(move || {
            Self::list_blocking(&root, page_size, &prefix, cursor.as_deref())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("listing task failed: {e}")))?
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let path = self.path_for(key)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let uploaded = tokio::fs::metadata(&path)
            .await?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Some(StoredObject {
            key: key.to_string(),
            data: Bytes::from(data),
            content_type: None,
            uploaded,
        }))
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let dir = path
                .parent()
                .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
            std::fs::create_dir_all(dir)?;
            // Write beside the target and rename over it so readers never
            // observe a half-written object.
            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))?
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
