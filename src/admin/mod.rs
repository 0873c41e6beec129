//! Admin control plane.
//!
//! A separate URL space (`/admin/*`) on the primary listener, serving
//! metrics snapshots and runtime backend membership changes. Handlers
//! reach the pool only through the [`BackendRegistry`] trait.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::load_balancer::BackendRegistry;
use crate::metrics::Metrics;

/// State for the admin URL space.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<dyn BackendRegistry>,
    pub metrics: Arc<Metrics>,
}

/// Routes for the admin plane. Unlisted methods get 405 from the
/// method routers.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/metrics", get(handlers::get_metrics))
        .route("/admin/health", get(handlers::get_health))
        .route(
            "/admin/backends",
            get(handlers::list_backends)
                .post(handlers::add_backend)
                .delete(handlers::remove_backend),
        )
        .with_state(state)
}
