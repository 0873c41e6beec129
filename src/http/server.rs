//! HTTP server setup and the ingress adapter.
//!
//! # Responsibilities
//! - Create the Axum router: `/api` ingress plus the `/admin/*` URL space
//!   on the same listener
//! - Wire up middleware (tracing, body cap, request timeout, request ID)
//! - Dispatch `/api` requests: select a backend, forward, map failures
//!   to gateway status codes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, Response, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{self, AdminState};
use crate::config::ProxyConfig;
use crate::health::HealthChecker;
use crate::http::forward::{ForwardError, Forwarder};
use crate::http::request::{request_id, RequestIdLayer, X_REQUEST_ID, X_SERVED_BY};
use crate::lifecycle::ShutdownHandle;
use crate::load_balancer::{BackendPool, BackendRegistry};
use crate::metrics::Metrics;
use crate::observability::exporter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BackendPool>,
    pub health: Arc<HealthChecker>,
    pub metrics: Arc<Metrics>,
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server hosting the ingress and admin planes.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Assemble all subsystems and register the initial backend set.
    /// `backends` must already be normalized origin URLs.
    pub fn new(config: ProxyConfig, backends: Vec<String>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let health = Arc::new(HealthChecker::new(&config.health_check));
        let pool = Arc::new(BackendPool::new(
            Arc::clone(&health),
            Arc::clone(&metrics),
            config.circuit_breaker.clone(),
        ));
        let forwarder = Arc::new(Forwarder::new(
            Arc::clone(&metrics),
            Duration::from_secs(config.timeouts.forward_secs),
        ));

        for url in &backends {
            pool.add(url);
        }

        let state = AppState {
            pool,
            health,
            metrics,
            forwarder,
        };

        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let admin_state = AdminState {
            registry: Arc::clone(&state.pool) as Arc<dyn BackendRegistry>,
            metrics: Arc::clone(&state.metrics),
        };

        Router::new()
            .route("/api", post(api_handler))
            .with_state(state)
            .merge(admin::router(admin_state))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal fires: stop accepting,
    /// drain in-flight requests, then cancel all health probes.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownHandle,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let health = Arc::clone(&self.state.health);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.triggered())
            .await?;

        health.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Ingress handler: pick a backend and proxy the request to it.
async fn api_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/json",
        );
    }

    let id = request_id(request.headers()).unwrap_or_default().to_string();

    let Some(backend) = state.pool.select_next() else {
        tracing::warn!(request_id = %id, "No healthy backends available");
        exporter::record_no_backend_available();
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No healthy backends available",
        );
    };

    tracing::debug!(request_id = %id, backend = %backend.url, "Forwarding request");

    match state.forwarder.forward(&backend, request).await {
        Ok(upstream) => {
            let (parts, body) = upstream.into_parts();
            let mut response = Response::from_parts(parts, Body::new(body));
            set_header(&mut response, X_SERVED_BY, &backend.url);
            set_header(&mut response, X_REQUEST_ID, &id);
            response
        }
        Err(ForwardError::Timeout(_)) => {
            error_response(StatusCode::GATEWAY_TIMEOUT, "Backend timeout")
        }
        Err(_) => error_response(StatusCode::BAD_GATEWAY, "Backend error"),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn set_header(response: &mut Response<Body>, name: &'static str, value: &str) {
    if let Ok(value) = axum::http::HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}
