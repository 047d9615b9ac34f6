//! HTTP server for the random image service.
//!
//! Serves a uniformly random image (optionally within a category), the raw
//! index, and a fire-and-forget refresh endpoint on top of the
//! [`rimg_index`] builder and cache.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{Action, AllowAllAuth, AuthProvider, Credentials, TokenAuth};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RandomImage;
pub use server::{spawn_scheduled_refresh, RimgServer};
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use bytes::Bytes;
    use chrono::DateTime;
    use rimg_store::{InMemoryObjectStore, ObjectStore};
    use tower::util::ServiceExt;

    use super::*;

    fn seeded_store() -> Arc<InMemoryObjectStore> {
        let store = InMemoryObjectStore::with_page_size(2);
        let t0 = DateTime::from_timestamp(0, 0);
        store.insert("cats/orange.jpg", Bytes::from_static(b"orange-bytes"), t0);
        store.insert("dogs/a.jpg", Bytes::from_static(b"a-bytes"), t0);
        store.insert("dogs/b.png", Bytes::from_static(b"b-bytes"), t0);
        store.insert("notes.txt", Bytes::from_static(b"not an image"), t0);
        Arc::new(store)
    }

    fn app_with(store: Arc<InMemoryObjectStore>, config: ServerConfig) -> (AppState, Router) {
        let state = AppState::new(store, config).unwrap();
        let router = router::build_router(state.clone());
        (state, router)
    }

    async fn indexed_app() -> (Arc<InMemoryObjectStore>, Router) {
        let store = seeded_store();
        let (state, router) = app_with(Arc::clone(&store), ServerConfig::default());
        state.builder.refresh().await.unwrap();
        (store, router)
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, header::HeaderMap, Bytes) {
        send_request(router, Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (_, router) = app_with(seeded_store(), ServerConfig::default());
        let (status, _, _) = send(&router, "GET", "/v1/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (_, router) = indexed_app().await;
        let (status, _, body) = send(&router, "GET", "/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(info["snapshot_key"], "list.json");
        assert_eq!(info["ttl_secs"], 3600);
    }

    #[tokio::test]
    async fn random_without_index_is_not_found() {
        let (_, router) = app_with(seeded_store(), ServerConfig::default());
        let (status, _, _) = send(&router, "GET", "/api").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn random_streams_an_indexed_image() {
        let (_, router) = indexed_app().await;
        let (status, headers, body) = send(&router, "GET", "/api").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("image/"));
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
        assert!([&b"orange-bytes"[..], b"a-bytes", b"b-bytes"].contains(&body.as_ref()));
    }

    #[tokio::test]
    async fn random_json_reports_key_time_and_url() {
        let (_, router) = indexed_app().await;
        let (status, headers, body) = send(&router, "GET", "/api?json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let image: RandomImage = serde_json::from_slice(&body).unwrap();
        assert!(["cats/orange.jpg", "dogs/a.jpg", "dogs/b.png"].contains(&image.key.as_str()));
        assert_eq!(image.uploaded, "1970-01-01 08:00:00");
        assert_eq!(image.url, format!("/images/{}", image.key));
        let expected_size = match image.key.as_str() {
            "cats/orange.jpg" => b"orange-bytes".len(),
            "dogs/a.jpg" => b"a-bytes".len(),
            _ => b"b-bytes".len(),
        };
        assert_eq!(image.size, expected_size as u64);
    }

    #[tokio::test]
    async fn random_in_category_stays_in_category() {
        let (_, router) = indexed_app().await;
        for _ in 0..20 {
            let (status, _, body) = send(&router, "GET", "/api?category=dogs&json=1").await;
            assert_eq!(status, StatusCode::OK);
            let image: RandomImage = serde_json::from_slice(&body).unwrap();
            assert!(image.key.starts_with("dogs/"), "picked {}", image.key);
        }
    }

    #[tokio::test]
    async fn random_in_unknown_category_is_not_found() {
        let (_, router) = indexed_app().await;
        let (status, _, _) = send(&router, "GET", "/api?category=birds").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn random_pick_of_deleted_object_is_not_found() {
        let (store, router) = indexed_app().await;
        store.remove("cats/orange.jpg");
        let (status, _, _) = send(&router, "GET", "/api?category=cats").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn random_json_of_deleted_object_is_not_found() {
        let (store, router) = indexed_app().await;
        store.remove("cats/orange.jpg");
        let (status, _, _) = send(&router, "GET", "/api?category=cats&json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn corrupt_index_is_server_error() {
        let store = seeded_store();
        store.insert("list.json", Bytes::from_static(b"{\"a\":"), None);
        let (_, router) = app_with(store, ServerConfig::default());
        let (status, _, _) = send(&router, "GET", "/api").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn image_by_key() {
        let (_, router) = indexed_app().await;
        let (status, headers, body) = send(&router, "GET", "/images/dogs/b.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(body.as_ref(), b"b-bytes");

        let (status, _, _) = send(&router, "GET", "/images/dogs/zzz.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_json_returns_index() {
        let (_, router) = indexed_app().await;
        let (status, headers, body) = send(&router, "GET", "/list.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let index: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(index["dogs"]["a.jpg"], "1970-01-01 08:00:00");
        assert!(index.get("notes.txt").is_none());
    }

    #[tokio::test]
    async fn list_json_before_first_build_is_not_found() {
        let (_, router) = app_with(seeded_store(), ServerConfig::default());
        let (status, _, _) = send(&router, "GET", "/list.json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_is_accepted_and_builds_in_background() {
        let store = seeded_store();
        let (_, router) = app_with(Arc::clone(&store), ServerConfig::default());
        let (status, _, _) = send(&router, "POST", "/refresh").await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let mut persisted = false;
        for _ in 0..200 {
            if store.get("list.json").await.unwrap().is_some() {
                persisted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(persisted, "background refresh never wrote the snapshot");

        let (status, _, _) = send(&router, "GET", "/api").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_requires_token_when_configured() {
        let config = ServerConfig {
            refresh_token: Some("s3cret".into()),
            ..Default::default()
        };
        let (_, router) = app_with(seeded_store(), config);

        let (status, _, _) = send(&router, "POST", "/refresh").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/refresh")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send_request(&router, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn protected_index_requires_token() {
        let store = seeded_store();
        let config = ServerConfig {
            refresh_token: Some("s3cret".into()),
            protect_index: true,
            ..Default::default()
        };
        let (state, router) = app_with(store, config);
        state.builder.refresh().await.unwrap();

        let (status, _, _) = send(&router, "GET", "/list.json").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/list.json")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send_request(&router, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(&router, "GET", "/api").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_rejects_get() {
        let (_, router) = app_with(seeded_store(), ServerConfig::default());
        let (status, _, _) = send(&router, "GET", "/refresh").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
