use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Listing metadata for one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Full slash-delimited key.
    pub key: String,
    /// Size of the object body in bytes.
    pub size: u64,
    /// Upload time, or `None` when the backend could not report one.
    pub uploaded: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(key: impl Into<String>, size: u64, uploaded: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            size,
            uploaded,
        }
    }
}

/// One page of a cursor-continued listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Entries on this page, in key order.
    pub entries: Vec<ObjectMeta>,
    /// Cursor for the next page. `None` marks the final page.
    pub next_cursor: Option<String>,
}

impl ListPage {
    /// Returns `true` if this is the last page of the listing.
    pub fn is_final(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// An object read back from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub data: Bytes,
    /// Content type recorded at write time, if the backend keeps one.
    pub content_type: Option<String>,
    pub uploaded: Option<DateTime<Utc>>,
}

impl StoredObject {
    /// Size of the body in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The recorded content type, falling back to a guess from the key.
    pub fn content_type_or_guess(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or_else(|| content_type_for_key(&self.key))
    }
}

/// Guess a MIME type from the key's extension (case-insensitive).
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Reject keys that cannot name an object.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.ends_with(crate::KEY_SEPARATOR) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
