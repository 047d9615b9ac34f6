use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all service endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(handler::random_handler))
        .route("/images/*key", get(handler::image_handler))
        .route("/list.json", get(handler::list_handler))
        .route("/refresh", post(handler::refresh_handler))
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
