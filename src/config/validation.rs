//! Configuration and backend URL validation.

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a ProxyConfig for semantic correctness.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError(
            "health_check.interval_secs must be > 0".to_string(),
        ));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError(
            "health_check.timeout_secs must be > 0".to_string(),
        ));
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError(
            "health_check.path must start with '/'".to_string(),
        ));
    }
    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError(
            "circuit_breaker.failure_threshold must be > 0".to_string(),
        ));
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError(
            "timeouts.forward_secs must be > 0".to_string(),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError(
            "listener.max_body_bytes must be > 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Error from backend URL validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UrlError {
    #[error("URL cannot be empty")]
    Empty,
    #[error("invalid URL format")]
    Malformed,
    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("URL must include a host")]
    MissingHost,
}

/// Validate a raw backend URL and normalize it to an origin.
///
/// The scheme defaults to `http` when absent; the port defaults to 80 or
/// 443 per scheme. The result is always `scheme://host:port`, so two
/// spellings of the same origin dedupe to one pool entry. Normalization
/// is idempotent.
pub fn normalize_backend_url(raw: &str) -> Result<String, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let parsed = Url::parse(&candidate).map_err(|_| UrlError::Malformed)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => return Err(UrlError::MissingHost),
    };
    let port = parsed.port_or_known_default().ok_or(UrlError::Malformed)?;

    Ok(format!("{}://{}:{}", parsed.scheme(), host, port))
}
