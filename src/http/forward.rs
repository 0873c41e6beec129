//! Single-attempt forwarding of one inbound request to a chosen backend.
//!
//! The forwarder is stateless; every outcome is attributed to the
//! backend's circuit breaker and to the metrics store before it is
//! surfaced. It never retries against a different backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::time::Instant;

use crate::http::request::{request_id, timestamp_request_id, X_REQUEST_ID};
use crate::load_balancer::Backend;
use crate::metrics::Metrics;
use crate::observability::exporter;

/// Errors surfaced to the ingress adapter. The distinction matters
/// there: a missed deadline maps to 504, everything else to 502.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),
    #[error("transport error talking to backend: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("could not build outbound request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

/// Translates inbound requests into outbound calls against a backend.
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    metrics: Arc<Metrics>,
    timeout: Duration,
}

impl Forwarder {
    /// Idle outbound connections are kept warm this long.
    const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
    /// Idle connections retained per backend host.
    const POOL_MAX_IDLE_PER_HOST: usize = 10;

    pub fn new(metrics: Arc<Metrics>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Self::POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(Self::POOL_MAX_IDLE_PER_HOST)
            .build(HttpConnector::new());
        Self {
            client,
            metrics,
            timeout,
        }
    }

    /// Forward `request` to `backend` under the configured deadline.
    ///
    /// The outbound request reuses the inbound method, headers, and body
    /// stream, re-targeted at the backend root. A non-empty inbound
    /// `X-Request-ID` is reused; otherwise a timestamp-derived one is
    /// stamped on the outbound request. Responses with status < 500
    /// count as success on the breaker; everything else, including
    /// transport errors and the deadline, counts as failure.
    pub async fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, ForwardError> {
        let start = Instant::now();
        let deadline = start + self.timeout;

        let (parts, body) = request.into_parts();
        let id = match request_id(&parts.headers) {
            Some(id) => id.to_string(),
            None => timestamp_request_id(),
        };
        let method = parts.method.clone();

        let outbound = match self.build_outbound(backend, parts, body, &id) {
            Ok(outbound) => outbound,
            Err(error) => {
                self.metrics
                    .record_request_complete(&id, &backend.url, start.elapsed(), false);
                return Err(error);
            }
        };

        let result = tokio::time::timeout_at(deadline, self.client.request(outbound)).await;
        let elapsed = start.elapsed();

        let outcome = match result {
            Err(_) => {
                backend.breaker.record_failure();
                self.metrics
                    .record_request_complete(&id, &backend.url, elapsed, false);
                tracing::warn!(
                    request_id = %id,
                    backend = %backend.url,
                    timeout = ?self.timeout,
                    "Forward deadline exceeded"
                );
                Err(ForwardError::Timeout(self.timeout))
            }
            Ok(Err(error)) => {
                backend.breaker.record_failure();
                self.metrics
                    .record_request_complete(&id, &backend.url, elapsed, false);
                tracing::warn!(
                    request_id = %id,
                    backend = %backend.url,
                    error = %error,
                    "Forward transport error"
                );
                Err(ForwardError::Transport(error))
            }
            Ok(Ok(response)) => {
                let status = response.status();
                let success = status.as_u16() < 500;
                if success {
                    backend.breaker.record_success();
                } else {
                    backend.breaker.record_failure();
                }
                self.metrics
                    .record_request_complete(&id, &backend.url, elapsed, success);
                exporter::record_forward(method.as_str(), status.as_u16(), &backend.url, elapsed);
                Ok(response)
            }
        };

        exporter::record_breaker_state(&backend.url, backend.breaker.state());
        outcome
    }

    fn build_outbound(
        &self,
        backend: &Backend,
        parts: axum::http::request::Parts,
        body: Body,
        id: &str,
    ) -> Result<Request<Body>, ForwardError> {
        let uri: Uri = format!("{}/", backend.url)
            .parse()
            .map_err(axum::http::Error::from)?;

        let mut outbound = Request::builder().method(parts.method).uri(uri).body(body)?;
        *outbound.headers_mut() = parts.headers;
        if let Ok(value) = HeaderValue::from_str(id) {
            outbound.headers_mut().insert(X_REQUEST_ID, value);
        }
        Ok(outbound)
    }
}
