//! Round-robin reverse-proxy load balancer.
//!
//! A single ingress endpoint fans requests out over a dynamically
//! managed pool of upstream backends. Selection is round-robin, gated
//! per backend by an active health prober and a circuit breaker; an
//! admin URL space mutates membership and exposes request metrics at
//! runtime.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod metrics;
pub mod observability;
pub mod resilience;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, ShutdownHandle};
