use std::sync::Arc;

use rimg_index::{Clock, IndexBuilder, IndexCache, SystemClock};
use rimg_store::ObjectStore;

use crate::auth::{AllowAllAuth, AuthProvider, TokenAuth};
use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub cache: Arc<IndexCache>,
    pub builder: Arc<IndexBuilder>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: ServerConfig) -> ServerResult<Self> {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        config: ServerConfig,
    ) -> ServerResult<Self> {
        config.validate()?;
        let cache = IndexCache::new(Arc::clone(&store), clock, &config.index)?;
        let builder = IndexBuilder::new(Arc::clone(&store), &config.index)?;
        let auth: Arc<dyn AuthProvider> = match &config.refresh_token {
            Some(token) => Arc::new(TokenAuth::new(token.clone()).guard_reads(config.protect_index)),
            None => Arc::new(AllowAllAuth),
        };
        Ok(Self {
            store,
            cache: Arc::new(cache),
            builder: Arc::new(builder),
            auth,
            config: Arc::new(config),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cache", &self.cache)
            .field("builder", &self.builder)
            .finish()
    }
}
