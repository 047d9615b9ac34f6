use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rimg_index::IndexConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory served as the object namespace.
    pub storage_root: PathBuf,
    /// Entries per listing page when walking the store.
    pub page_size: usize,
    /// Bearer token required by `POST /refresh`; open when unset.
    pub refresh_token: Option<String>,
    /// Also require `refresh_token` for `GET /list.json`.
    pub protect_index: bool,
    /// Rebuild the index on this period, in seconds.
    pub refresh_interval_secs: Option<u64>,
    /// Kick off one detached build when the server starts.
    pub build_on_start: bool,
    /// `Cache-Control: max-age` sent with image bodies.
    pub image_cache_max_age_secs: u64,
    pub index: IndexConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            storage_root: PathBuf::from("."),
            page_size: rimg_store::DEFAULT_PAGE_SIZE,
            refresh_token: None,
            protect_index: false,
            refresh_interval_secs: None,
            build_on_start: false,
            image_cache_max_age_secs: 3600,
            index: IndexConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.page_size == 0 {
            return Err(ServerError::Config("page_size must be positive".into()));
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(ServerError::Config("refresh_interval_secs must be positive".into()));
        }
        if self.refresh_token.as_deref() == Some("") {
            return Err(ServerError::Config("refresh_token must not be empty".into()));
        }
        if self.protect_index && self.refresh_token.is_none() {
            return Err(ServerError::Config("protect_index requires refresh_token".into()));
        }
        self.index.validate()?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_secs.map(Duration::from_secs)
    }
}
