use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use rimg_index::selector;
use rimg_store::StoredObject;

use crate::auth::{Action, Credentials};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    /// Category path to restrict the pick to.
    pub category: Option<String>,
    /// Present (any value) to get metadata instead of the image body.
    pub json: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomImage {
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    pub uploaded: String,
    pub url: String,
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "rimg-server",
        "version": env!("CARGO_PKG_VERSION"),
        "snapshot_key": state.builder.snapshot_key(),
        "ttl_secs": state.cache.ttl().num_seconds(),
        "loaded_at": state.cache.loaded_at().map(|t| t.to_rfc3339()),
    }))
}

/// `GET /api`: a uniformly random image, optionally within `category`.
pub async fn random_handler(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
) -> ServerResult<Response> {
    let tree = state.cache.get().await?;
    let scope = query.category.as_deref().filter(|c| !c.is_empty());
    let selection = selector::pick(&tree, scope, &mut rand::thread_rng())?;
    tracing::debug!(key = %selection.key, ?scope, "picked image");

    let object = state
        .store
        .get(&selection.key)
        .await?
        .ok_or_else(|| ServerError::ImageNotFound(selection.key.clone()))?;

    if query.json.is_some() {
        let url = image_url(&selection.key);
        return Ok(Json(RandomImage {
            key: selection.key,
            size: object.size(),
            uploaded: selection.uploaded,
            url,
        })
        .into_response());
    }
    Ok(image_response(object, state.config.image_cache_max_age_secs))
}

/// `GET /images/*key`: one object by key.
pub async fn image_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    let object = state
        .store
        .get(&key)
        .await?
        .ok_or(ServerError::ImageNotFound(key))?;
    Ok(image_response(object, state.config.image_cache_max_age_secs))
}

/// `GET /list.json`: the current index as JSON.
pub async fn list_handler(State(state): State<AppState>, headers: HeaderMap) -> ServerResult<Response> {
    let credentials = Credentials::from_headers(&headers);
    if !state.auth.authorize(&credentials, Action::ReadIndex).await? {
        return Err(ServerError::Unauthorized(Action::ReadIndex.to_string()));
    }
    let tree = state.cache.get().await?;
    let body = serde_json::to_vec(tree.as_ref()).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

/// `POST /refresh`: start a detached rebuild and answer immediately.
pub async fn refresh_handler(State(state): State<AppState>, headers: HeaderMap) -> ServerResult<Response> {
    let credentials = Credentials::from_headers(&headers);
    if !state.auth.authorize(&credentials, Action::Refresh).await? {
        return Err(ServerError::Unauthorized(Action::Refresh.to_string()));
    }
    // Dropping the handle detaches the build; its errors are logged.
    drop(state.builder.spawn_refresh());
    tracing::info!("index refresh accepted");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response())
}

fn image_response(object: StoredObject, max_age: u64) -> Response {
    let content_type = object.content_type_or_guess().to_string();
    (
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, format!("public, max-age={max_age}")),
        ],
        object.data,
    )
        .into_response()
}

/// Path under which `key` is served, with each segment percent-encoded.
pub fn image_url(key: &str) -> String {
    let mut url = String::from("/images/");
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                url.push(byte as char)
            }
            _ => url.push_str(&format!("%{byte:02X}")),
        }
    }
    url
}
