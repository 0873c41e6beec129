//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives
//!     → pool.rs (round-robin rotation over the ordered backend set)
//!     → candidate gated by health map and circuit breaker
//!     → Return backend or "none available"
//! ```
//!
//! The admin plane mutates the pool through the narrow
//! [`BackendRegistry`] surface rather than the concrete type, so its
//! handlers can be exercised against a fake registry in tests.

pub mod backend;
pub mod pool;

pub use backend::Backend;
pub use pool::BackendPool;

/// The mutation surface exposed to the admin plane.
///
/// URLs are expected to be normalized before they reach the registry.
pub trait BackendRegistry: Send + Sync {
    /// Add a backend. Idempotent; returns `false` when the URL was
    /// already present.
    fn add(&self, url: &str) -> bool;

    /// Remove a backend. No-op for unknown URLs.
    fn remove(&self, url: &str);

    /// Backend URLs in pool order.
    fn list(&self) -> Vec<String>;
}
