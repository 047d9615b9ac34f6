//! Eligibility rules and timestamp rendering for indexed objects.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rimg_store::KEY_SEPARATOR;

use crate::config::IndexConfig;
use crate::error::IndexResult;
use crate::snapshot::MAX_DEPTH;

/// Why a listed key was left out of the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ineligible {
    /// Pseudo-directory marker (key ends with `/`).
    DirectoryMarker,
    /// The index snapshot itself.
    Snapshot,
    /// Extension missing or not a recognized image type.
    Extension,
    /// More segments than the index may nest.
    TooDeep,
}

/// Decides which listed keys become index leaves.
#[derive(Clone, Debug)]
pub struct Eligibility {
    snapshot_key: String,
    extensions: Vec<String>,
    max_depth: usize,
}

impl Eligibility {
    pub fn new(snapshot_key: impl Into<String>, extensions: &[String]) -> Self {
        Self {
            snapshot_key: snapshot_key.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.snapshot_key.clone(), &config.extensions).with_max_depth(config.max_depth)
    }

    pub fn check(&self, key: &str) -> Result<(), Ineligible> {
        if key.is_empty() || key.ends_with(KEY_SEPARATOR) {
            return Err(Ineligible::DirectoryMarker);
        }
        if key == self.snapshot_key {
            return Err(Ineligible::Snapshot);
        }
        // Only the final segment carries the extension: `a.b/c` has none.
        let name = key.rsplit(KEY_SEPARATOR).next().unwrap_or(key);
        match name.rsplit_once('.') {
            Some((_, ext)) if self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) => {}
            _ => return Err(Ineligible::Extension),
        }
        if key.split(KEY_SEPARATOR).count() > self.max_depth {
            return Err(Ineligible::TooDeep);
        }
        Ok(())
    }

    pub fn is_eligible(&self, key: &str) -> bool {
        self.check(key).is_ok()
    }
}

/// Renders upload times as `YYYY-MM-DD HH:MM:SS` in a fixed civil zone.
#[derive(Clone, Debug)]
pub struct TimestampFormatter {
    zone: Tz,
    placeholder: String,
}

impl TimestampFormatter {
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(zone: Tz, placeholder: impl Into<String>) -> Self {
        Self {
            zone,
            placeholder: placeholder.into(),
        }
    }

    pub fn from_config(config: &IndexConfig) -> IndexResult<Self> {
        Ok(Self::new(
            config.time_zone()?,
            config.placeholder_timestamp.clone(),
        ))
    }

    pub fn format(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.zone).format(Self::FORMAT).to_string()
    }

    /// Format `at`, or return `None` when there is nothing to format.
    pub fn format_opt(&self, at: Option<DateTime<Utc>>) -> Option<String> {
        at.map(|t| self.format(t))
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}
