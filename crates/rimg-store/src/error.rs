/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is empty or escapes the store namespace.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The listing cursor was not issued by this store.
    #[error("invalid listing cursor: {0:?}")]
    InvalidCursor(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
