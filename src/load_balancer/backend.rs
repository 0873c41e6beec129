//! Backend abstraction.

use crate::resilience::CircuitBreaker;

/// A single upstream origin, identified by its normalized URL
/// (`scheme://host:port`).
///
/// The backend carries its own circuit breaker; liveness is tracked
/// separately by the health checker and keyed by URL. Removing and
/// re-adding a URL builds a fresh instance, so the breaker starts closed
/// again.
#[derive(Debug)]
pub struct Backend {
    /// Normalized origin URL.
    pub url: String,
    /// Failure-isolation state for this backend alone.
    pub breaker: CircuitBreaker,
}

impl Backend {
    pub fn new(url: String, breaker: CircuitBreaker) -> Self {
        Self { url, breaker }
    }
}
