//! Admin endpoint handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::AdminState;
use crate::config::validation::{normalize_backend_url, UrlError};

#[derive(Debug, Deserialize)]
pub struct BackendRequest {
    pub url: String,
}

/// GET /admin/metrics: consistent snapshot of the metrics store.
pub async fn get_metrics(State(state): State<AdminState>) -> Response {
    Json(state.metrics.snapshot()).into_response()
}

/// GET /admin/health: backend list plus a liveness marker for the
/// proxy itself.
pub async fn get_health(State(state): State<AdminState>) -> Response {
    Json(json!({
        "backends": state.registry.list(),
        "status": "ok",
    }))
    .into_response()
}

/// GET /admin/backends: current membership in pool order.
pub async fn list_backends(State(state): State<AdminState>) -> Response {
    Json(json!({ "backends": state.registry.list() })).into_response()
}

/// POST /admin/backends: validate, normalize, and add.
pub async fn add_backend(
    State(state): State<AdminState>,
    payload: Result<Json<BackendRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = payload else {
        return invalid_body();
    };

    match normalize_backend_url(&body.url) {
        Ok(url) => {
            if state.registry.add(&url) {
                tracing::info!(backend = %url, "Backend added via admin");
            }
            (
                StatusCode::CREATED,
                Json(json!({ "status": "added", "backend": url })),
            )
                .into_response()
        }
        Err(error) => bad_url(error),
    }
}

/// DELETE /admin/backends: validate, normalize, and remove.
pub async fn remove_backend(
    State(state): State<AdminState>,
    payload: Result<Json<BackendRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = payload else {
        return invalid_body();
    };

    match normalize_backend_url(&body.url) {
        Ok(url) => {
            state.registry.remove(&url);
            tracing::info!(backend = %url, "Backend removed via admin");
            Json(json!({ "status": "removed", "backend": url })).into_response()
        }
        Err(error) => bad_url(error),
    }
}

fn invalid_body() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request body" })),
    )
        .into_response()
}

fn bad_url(error: UrlError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": error.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::body::to_bytes;

    use crate::load_balancer::BackendRegistry;
    use crate::metrics::Metrics;

    #[derive(Default)]
    struct FakeRegistry {
        backends: Mutex<Vec<String>>,
    }

    impl BackendRegistry for FakeRegistry {
        fn add(&self, url: &str) -> bool {
            let mut backends = self.backends.lock().unwrap();
            if backends.iter().any(|b| b == url) {
                false
            } else {
                backends.push(url.to_string());
                true
            }
        }

        fn remove(&self, url: &str) {
            self.backends.lock().unwrap().retain(|b| b != url);
        }

        fn list(&self) -> Vec<String> {
            self.backends.lock().unwrap().clone()
        }
    }

    fn admin_state() -> AdminState {
        AdminState {
            registry: Arc::new(FakeRegistry::default()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn add_normalizes_and_reports_created() {
        let state = admin_state();
        let response = add_backend(
            State(state.clone()),
            Ok(Json(BackendRequest {
                url: "http://b".to_string(),
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "added");
        assert_eq!(body["backend"], "http://b:80");
        assert_eq!(state.registry.list(), vec!["http://b:80"]);
    }

    #[tokio::test]
    async fn duplicate_add_leaves_one_entry() {
        let state = admin_state();
        for _ in 0..2 {
            let response = add_backend(
                State(state.clone()),
                Ok(Json(BackendRequest {
                    url: "http://b:80".to_string(),
                })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        assert_eq!(state.registry.list().len(), 1);
    }

    #[tokio::test]
    async fn empty_url_is_rejected_with_message() {
        let response = add_backend(
            State(admin_state()),
            Ok(Json(BackendRequest {
                url: String::new(),
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "URL cannot be empty");
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let response = add_backend(
            State(admin_state()),
            Ok(Json(BackendRequest {
                url: "ftp://x".to_string(),
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("scheme"));
    }

    #[tokio::test]
    async fn remove_reports_the_normalized_url() {
        let state = admin_state();
        state.registry.add("http://b:80");

        let response = remove_backend(
            State(state.clone()),
            Ok(Json(BackendRequest {
                url: "http://b".to_string(),
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "removed");
        assert_eq!(body["backend"], "http://b:80");
        assert!(state.registry.list().is_empty());
    }

    #[tokio::test]
    async fn health_reports_backends_and_ok() {
        let state = admin_state();
        state.registry.add("http://a:80");

        let response = get_health(State(state)).await;
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backends"], json!(["http://a:80"]));
    }
}
