use std::time::Duration;

use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::snapshot::MAX_DEPTH;

/// Configuration for building, persisting and caching the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Store key the snapshot is persisted under.
    pub snapshot_key: String,
    /// How long a loaded snapshot is served before it is re-read.
    pub ttl_secs: u64,
    /// IANA zone used to render upload timestamps.
    pub time_zone: String,
    /// Recognized image extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Leaf value used when an object carries no usable upload time.
    pub placeholder_timestamp: String,
    /// Keys with more segments than this are left out of the index.
    pub max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            snapshot_key: "list.json".into(),
            ttl_secs: 3600,
            time_zone: "Asia/Shanghai".into(),
            extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            placeholder_timestamp: "0000-00-00 00:00:00".into(),
            max_depth: MAX_DEPTH,
        }
    }
}

impl IndexConfig {
    /// Check every field and fail on the first invalid one.
    pub fn validate(&self) -> IndexResult<()> {
        if self.snapshot_key.is_empty() || self.snapshot_key.ends_with('/') {
            return Err(IndexError::Config(format!(
                "snapshot_key must name an object, got {:?}",
                self.snapshot_key
            )));
        }
        if self.extensions.is_empty() {
            return Err(IndexError::Config("extensions must not be empty".into()));
        }
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH {
            return Err(IndexError::Config(format!(
                "max_depth must be between 1 and {MAX_DEPTH}, got {}",
                self.max_depth
            )));
        }
        self.time_zone()?;
        self.ttl()?;
        Ok(())
    }

    /// The parsed rendering zone.
    pub fn time_zone(&self) -> IndexResult<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| IndexError::Config(format!("unknown time zone {:?}", self.time_zone)))
    }

    /// The cache freshness window.
    pub fn ttl(&self) -> IndexResult<TimeDelta> {
        if self.ttl_secs == 0 {
            return Err(IndexError::Config("ttl_secs must be positive".into()));
        }
        TimeDelta::from_std(Duration::from_secs(self.ttl_secs))
            .map_err(|_| IndexError::Config(format!("ttl_secs {} is out of range", self.ttl_secs)))
    }
}
