//! Error types for the index crate.

use rimg_store::StoreError;

/// Errors that can occur while building, loading or querying the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Enumerating the store failed; the build was aborted.
    #[error("listing failed: {0}")]
    Listing(#[source] StoreError),

    /// Persisting the snapshot failed; the previous snapshot stays current.
    #[error("snapshot write failed: {0}")]
    Write(#[source] StoreError),

    /// Reading the snapshot from the store failed.
    #[error("snapshot read failed: {0}")]
    SnapshotRead(#[source] StoreError),

    /// No snapshot has ever been persisted.
    #[error("no index snapshot at {0:?}")]
    SnapshotMissing(String),

    /// The persisted snapshot could not be parsed.
    #[error("corrupt index snapshot at {key:?}: {reason}")]
    SnapshotCorrupt { key: String, reason: String },

    /// The scope has no eligible leaves (unknown or empty category).
    #[error("no images match scope {0:?}")]
    NoMatch(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error while encoding a snapshot.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A background refresh task panicked or was cancelled.
    #[error("background refresh aborted: {0}")]
    Aborted(String),
}

impl IndexError {
    /// Returns `true` for failures a caller should report as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SnapshotMissing(_) | Self::NoMatch(_))
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
