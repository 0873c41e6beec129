//! Health checking subsystem.
//!
//! Liveness is keyed by backend URL and owned here, not on the backend
//! itself: the pool asks "is this URL healthy right now" at selection
//! time and never caches the answer.

pub mod checker;

pub use checker::HealthChecker;
