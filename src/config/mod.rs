//! Configuration subsystem.
//!
//! Tunables come from defaults, optionally overridden by a TOML file
//! (`CONFIG_FILE`); the backend list comes from the `BACKENDS` env var.
//! Both are validated before the server starts.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{backends_from_env, load_config, load_from_env, ConfigError};
pub use schema::{
    CircuitBreakerConfig, HealthCheckConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TimeoutConfig,
};
pub use validation::{normalize_backend_url, validate_config, UrlError, ValidationError};
