//! Configuration loading from the environment and optional TOML file.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{normalize_backend_url, validate_config, UrlError, ValidationError};

/// Comma-separated list of backend origin URLs. Required.
pub const BACKENDS_ENV: &str = "BACKENDS";

/// Optional path to a TOML file overriding the default tunables.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error("BACKENDS env var required")]
    MissingBackends,
    #[error("invalid backend URL '{url}': {source}")]
    InvalidBackend { url: String, source: UrlError },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Resolve configuration: the file named by `CONFIG_FILE` if set,
/// otherwise the built-in defaults.
pub fn load_from_env() -> Result<ProxyConfig, ConfigError> {
    match env::var(CONFIG_FILE_ENV) {
        Ok(path) if !path.is_empty() => load_config(Path::new(&path)),
        _ => Ok(ProxyConfig::default()),
    }
}

/// Read the initial backend set from the `BACKENDS` env var.
///
/// Every entry is normalized; an entry that fails validation is fatal, as
/// is an absent or empty list.
pub fn backends_from_env() -> Result<Vec<String>, ConfigError> {
    parse_backends(&env::var(BACKENDS_ENV).unwrap_or_default())
}

fn parse_backends(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut backends = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let url = normalize_backend_url(entry).map_err(|source| ConfigError::InvalidBackend {
            url: entry.to_string(),
            source,
        })?;
        if !backends.contains(&url) {
            backends.push(url);
        }
    }

    if backends.is_empty() {
        return Err(ConfigError::MissingBackends);
    }
    Ok(backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_backend_list() {
        let backends = parse_backends("http://a, b:3000 ,https://c").unwrap();
        assert_eq!(
            backends,
            vec!["http://a:80", "http://b:3000", "https://c:443"]
        );
    }

    #[test]
    fn deduplicates_equivalent_spellings() {
        let backends = parse_backends("http://a,http://a:80,a:80").unwrap();
        assert_eq!(backends, vec!["http://a:80"]);
    }

    #[test]
    fn empty_list_is_fatal() {
        assert!(matches!(
            parse_backends(""),
            Err(ConfigError::MissingBackends)
        ));
        assert!(matches!(
            parse_backends(" , "),
            Err(ConfigError::MissingBackends)
        ));
    }

    #[test]
    fn invalid_entry_is_fatal() {
        let error = parse_backends("http://a,ftp://b").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidBackend { .. }));
    }

    #[test]
    fn toml_round_trip() {
        let toml = r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [health_check]
            interval_secs = 1

            [circuit_breaker]
            cooldown_secs = 3
        "#;
        let config: ProxyConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.health_check.interval_secs, 1);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert_eq!(config.circuit_breaker.cooldown_secs, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }
}
