//! Full-namespace walk that produces and persists the index snapshot.
//!
//! The walk follows the listing cursor page by page and folds each page into
//! the tree as soon as it arrives, so peak memory is one page plus the tree
//! built so far. Bad individual entries are skipped or patched locally; only
//! a listing failure aborts the walk, and nothing is persisted unless the
//! whole walk succeeded.

use std::sync::Arc;

use bytes::Bytes;
use rimg_store::{ObjectMeta, ObjectStore};
use tokio::task::JoinHandle;

use crate::config::IndexConfig;
use crate::entry::{Eligibility, Ineligible, TimestampFormatter};
use crate::error::{IndexError, IndexResult};
use crate::snapshot::{self, SNAPSHOT_CONTENT_TYPE};
use crate::tree::{IndexTree, Inserted};

/// Counters collected during one build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Listing pages fetched.
    pub pages: u64,
    /// Objects seen across all pages.
    pub scanned: u64,
    /// Leaves in the finished tree.
    pub indexed: u64,
    /// Directory markers, the snapshot itself and non-image keys.
    pub ineligible: u64,
    /// Image keys with more segments than the configured maximum depth.
    pub too_deep: u64,
    /// Entries indexed with the placeholder timestamp.
    pub placeholder_timestamps: u64,
    /// Entries rejected because they collide with a leaf or branch.
    pub conflicts: u64,
}

/// Builds the index from the live store and writes it back as a snapshot.
pub struct IndexBuilder {
    store: Arc<dyn ObjectStore>,
    snapshot_key: String,
    eligibility: Eligibility,
    formatter: TimestampFormatter,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("snapshot_key", &self.snapshot_key)
            .finish()
    }
}

impl IndexBuilder {
    pub fn new(store: Arc<dyn ObjectStore>, config: &IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            snapshot_key: config.snapshot_key.clone(),
            eligibility: Eligibility::from_config(config),
            formatter: TimestampFormatter::from_config(config)?,
        })
    }

    pub fn snapshot_key(&self) -> &str {
        &self.snapshot_key
    }

    /// Walk the whole namespace and return the folded tree.
    pub async fn build(&self) -> IndexResult<IndexTree> {
        self.build_with_stats().await.map(|(tree, _)| tree)
    }

    /// Like [`build`](Self::build), also returning the walk's counters.
    pub async fn build_with_stats(&self) -> IndexResult<(IndexTree, BuildStats)> {
        let mut tree = IndexTree::new();
        let mut stats = BuildStats::default();
        let mut cursor: Option<String> = None;

        tracing::info!(snapshot = %self.snapshot_key, "building image index");
        loop {
            let page = self
                .store
                .list(None, cursor.as_deref())
                .await
                .map_err(IndexError::Listing)?;
            stats.pages += 1;
            tracing::debug!(page = stats.pages, entries = page.entries.len(), "folding listing page");

            for meta in &page.entries {
                self.fold(&mut tree, meta, &mut stats);
            }

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(IndexError::Listing(rimg_store::StoreError::InvalidCursor(next)));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        stats.indexed = tree.leaf_count() as u64;
        tracing::info!(
            pages = stats.pages,
            scanned = stats.scanned,
            indexed = stats.indexed,
            ineligible = stats.ineligible,
            too_deep = stats.too_deep,
            placeholders = stats.placeholder_timestamps,
            conflicts = stats.conflicts,
            "image index built"
        );
        Ok((tree, stats))
    }

    fn fold(&self, tree: &mut IndexTree, meta: &ObjectMeta, stats: &mut BuildStats) {
        stats.scanned += 1;
        match self.eligibility.check(&meta.key) {
            Ok(()) => {}
            Err(Ineligible::TooDeep) => {
                tracing::warn!(key = %meta.key, "rejecting key nested deeper than the index allows");
                stats.too_deep += 1;
                return;
            }
            Err(reason) => {
                tracing::trace!(key = %meta.key, ?reason, "skipping ineligible key");
                stats.ineligible += 1;
                return;
            }
        }

        let timestamp = match self.formatter.format_opt(meta.uploaded) {
            Some(ts) => ts,
            None => {
                tracing::warn!(key = %meta.key, "no usable upload time, using placeholder");
                stats.placeholder_timestamps += 1;
                self.formatter.placeholder().to_string()
            }
        };

        match tree.insert(&meta.key, timestamp) {
            Ok(Inserted::New) | Ok(Inserted::Replaced) => {}
            Err(conflict) => {
                tracing::warn!(%conflict, "rejecting conflicting key");
                stats.conflicts += 1;
            }
        }
    }

    /// Write `tree` as the snapshot. The previous snapshot stays in place if
    /// this fails.
    pub async fn persist(&self, tree: &IndexTree) -> IndexResult<()> {
        let bytes = snapshot::encode(tree)?;
        let len = bytes.len();
        self.store
            .put(&self.snapshot_key, Bytes::from(bytes), SNAPSHOT_CONTENT_TYPE)
            .await
            .map_err(IndexError::Write)?;
        tracing::info!(snapshot = %self.snapshot_key, bytes = len, "index snapshot persisted");
        Ok(())
    }

    /// Build and persist in one go.
    pub async fn refresh(&self) -> IndexResult<BuildStats> {
        let (tree, stats) = self.build_with_stats().await?;
        self.persist(&tree).await?;
        Ok(stats)
    }

    /// Run [`refresh`](Self::refresh) on a detached task.
    ///
    /// The caller does not wait; failures are logged. Dropping the returned
    /// handle leaves the task running.
    pub fn spawn_refresh(self: &Arc<Self>) -> RefreshHandle {
        let builder = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = builder.refresh().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "background index refresh failed");
            }
            result
        });
        RefreshHandle { task }
    }
}

/// Completion notification for a background refresh.
#[derive(Debug)]
pub struct RefreshHandle {
    task: JoinHandle<IndexResult<BuildStats>>,
}

impl RefreshHandle {
    /// Returns `true` once the background task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the refresh and return its outcome.
    pub async fn wait(self) -> IndexResult<BuildStats> {
        self.task
            .await
            .map_err(|e| IndexError::Aborted(e.to_string()))?
    }
}
