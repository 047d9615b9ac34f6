use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use rimg_index::IndexBuilder;

use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Random image server.
pub struct RimgServer {
    state: AppState,
}

impl RimgServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let config = Arc::clone(&self.state.config);
        if config.build_on_start {
            drop(self.state.builder.spawn_refresh());
        }
        let scheduler = config
            .refresh_interval()
            .map(|period| spawn_scheduled_refresh(Arc::clone(&self.state.builder), period));

        let app = build_router(self.state);
        let listener = TcpListener::bind(&config.bind_addr).await?;
        tracing::info!("rimg server listening on {}", config.bind_addr);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        if let Some(task) = scheduler {
            task.abort();
        }
        served
    }
}

/// Rebuild the index every `period`, first tick one period from now.
///
/// Runs are sequential: a slow build delays the next tick instead of
/// overlapping it.
pub fn spawn_scheduled_refresh(builder: Arc<IndexBuilder>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match builder.refresh().await {
                Ok(stats) => tracing::info!(indexed = stats.indexed, "scheduled index refresh done"),
                Err(e) => tracing::error!(error = %e, "scheduled index refresh failed"),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
