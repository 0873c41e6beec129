//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, /api + /admin/* routing)
//!     → request.rs (ensure X-Request-ID)
//!     → load balancer picks a backend
//!     → forward.rs (outbound call under deadline)
//!     → response returned with X-Served-By / X-Request-ID
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use request::{RequestIdLayer, X_REQUEST_ID, X_SERVED_BY};
pub use server::{AppState, HttpServer};
