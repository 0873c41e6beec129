//! Active backend health probing.
//!
//! One background task per registered URL probes `GET <backend>/health`
//! on a fixed interval and records the outcome in a shared map. The map
//! is the single source of liveness truth: the selector reads it on the
//! hot path, so it sits behind a read-write lock and writes happen only
//! once per probe.
//!
//! A URL with no completed probe is reported unhealthy. A newly added
//! backend therefore receives no traffic until its first probe lands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axum::http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::config::HealthCheckConfig;
use crate::observability::exporter;

/// Background health prober with one task per backend URL.
///
/// Probes use their own HTTP client so they never compete with the
/// forwarding path for pooled connections.
pub struct HealthChecker {
    status: RwLock<HashMap<String, bool>>,
    probes: Mutex<HashMap<String, JoinHandle<()>>>,
    client: Client<HttpConnector, Empty<Bytes>>,
    interval: Duration,
    timeout: Duration,
    path: String,
}

impl HealthChecker {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            status: RwLock::new(HashMap::new()),
            probes: Mutex::new(HashMap::new()),
            client,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            path: config.path.clone(),
        }
    }

    /// Liveness as last observed by the prober. URLs never probed are
    /// unhealthy.
    pub fn is_healthy(&self, url: &str) -> bool {
        self.status.read().unwrap().get(url).copied().unwrap_or(false)
    }

    /// Spawn the probe loop for `url`. No-op if one is already running.
    pub fn start_checking(self: &Arc<Self>, url: &str) {
        let mut probes = self.probes.lock().unwrap();
        if probes.contains_key(url) {
            return;
        }

        let checker = Arc::clone(self);
        let target = url.to_string();
        let handle = tokio::spawn(async move {
            // Stagger startup so a batch of backends added together does
            // not probe in lockstep.
            let jitter = { rand::thread_rng().gen_range(0..250u64) };
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            let mut ticker = tokio::time::interval(checker.interval);
            loop {
                ticker.tick().await;
                let healthy = checker.probe(&target).await;
                checker.set_health(&target, healthy);
                exporter::record_backend_health(&target, healthy);
            }
        });
        probes.insert(url.to_string(), handle);

        tracing::debug!(backend = %url, "Health probing started");
    }

    /// Cancel the probe loop for `url` and forget its liveness entry, so
    /// the URL is fail-closed again if it is ever re-added.
    pub fn stop_checking(&self, url: &str) {
        if let Some(handle) = self.probes.lock().unwrap().remove(url) {
            handle.abort();
            tracing::debug!(backend = %url, "Health probing stopped");
        }
        self.status.write().unwrap().remove(url);
    }

    /// Cancel every probe task. Called on process shutdown.
    pub fn shutdown(&self) {
        let mut probes = self.probes.lock().unwrap();
        for (_, handle) in probes.drain() {
            handle.abort();
        }
    }

    /// One probe: healthy iff the backend answers 200 within the timeout
    /// and the body is a JSON object with `"status":"ok"`.
    async fn probe(&self, url: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.check(url)).await {
            Ok(healthy) => healthy,
            Err(_) => false,
        }
    }

    async fn check(&self, url: &str) -> bool {
        let uri: Uri = match format!("{}{}", url, self.path).parse() {
            Ok(uri) => uri,
            Err(_) => return false,
        };
        let request = match Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Empty::<Bytes>::new())
        {
            Ok(request) => request,
            Err(_) => return false,
        };

        let response = match self.client.request(request).await {
            Ok(response) => response,
            Err(_) => return false,
        };
        if response.status() != StatusCode::OK {
            return false;
        }

        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => return false,
        };
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => value.get("status").and_then(|s| s.as_str()) == Some("ok"),
            Err(_) => false,
        }
    }

    pub(crate) fn set_health(&self, url: &str, healthy: bool) {
        let mut status = self.status.write().unwrap();
        let previous = status.insert(url.to_string(), healthy);
        if previous != Some(healthy) {
            tracing::info!(backend = %url, healthy, "Backend health changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a fixed response on an ephemeral port; returns the origin.
    async fn static_backend(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn probe_accepts_200_with_ok_body() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        let url = static_backend("200 OK", r#"{"status":"ok"}"#).await;
        assert!(checker.probe(&url).await);
    }

    #[tokio::test]
    async fn probe_rejects_wrong_status_field() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        let url = static_backend("200 OK", r#"{"status":"degraded"}"#).await;
        assert!(!checker.probe(&url).await);
    }

    #[tokio::test]
    async fn probe_rejects_malformed_body() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        let url = static_backend("200 OK", "not json").await;
        assert!(!checker.probe(&url).await);
    }

    #[tokio::test]
    async fn probe_rejects_non_200() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        let url = static_backend("503 Service Unavailable", r#"{"status":"ok"}"#).await;
        assert!(!checker.probe(&url).await);
    }

    #[tokio::test]
    async fn probe_fails_on_connection_refused() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!checker.probe(&format!("http://{addr}")).await);
    }

    #[test]
    fn unknown_urls_are_unhealthy() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        assert!(!checker.is_healthy("http://never-probed:80"));
    }

    #[test]
    fn reflects_latest_probe_outcome() {
        let checker = HealthChecker::new(&HealthCheckConfig::default());
        checker.set_health("http://a:80", true);
        assert!(checker.is_healthy("http://a:80"));

        checker.set_health("http://a:80", false);
        assert!(!checker.is_healthy("http://a:80"));
    }

    #[tokio::test]
    async fn stop_checking_forgets_the_entry() {
        let checker = Arc::new(HealthChecker::new(&HealthCheckConfig::default()));
        checker.start_checking("http://a:80");
        checker.set_health("http://a:80", true);

        checker.stop_checking("http://a:80");
        assert!(!checker.is_healthy("http://a:80"));
        assert!(checker.probes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_checking_is_idempotent() {
        let checker = Arc::new(HealthChecker::new(&HealthCheckConfig::default()));
        checker.start_checking("http://a:80");
        checker.start_checking("http://a:80");
        assert_eq!(checker.probes.lock().unwrap().len(), 1);
        checker.shutdown();
    }
}
