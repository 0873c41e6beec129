//! Backend pool and round-robin selector.
//!
//! The pool owns the ordered backend vector behind a read-write lock;
//! the rotation cursor is an atomic outside the lock. Selection takes
//! the read lock, so any number of request handlers can pick backends
//! concurrently while Add/Remove serialize briefly on the write lock.
//! Probe start/stop happens after the lock is released; no I/O or task
//! spawning runs under it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::CircuitBreakerConfig;
use crate::health::HealthChecker;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::BackendRegistry;
use crate::metrics::Metrics;
use crate::observability::exporter;
use crate::resilience::CircuitBreaker;

/// Ordered backend set plus the rotation cursor.
pub struct BackendPool {
    backends: RwLock<Vec<Arc<Backend>>>,
    cursor: AtomicU64,
    health: Arc<HealthChecker>,
    metrics: Arc<Metrics>,
    breaker_config: CircuitBreakerConfig,
}

impl BackendPool {
    pub fn new(
        health: Arc<HealthChecker>,
        metrics: Arc<Metrics>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
            cursor: AtomicU64::new(0),
            health,
            metrics,
            breaker_config,
        }
    }

    /// Append a backend and start probing it. Idempotent: a URL already
    /// in the pool is left untouched and `false` is returned.
    pub fn add(&self, url: &str) -> bool {
        let (added, size) = {
            let mut backends = self.backends.write().unwrap();
            if backends.iter().any(|b| b.url == url) {
                (false, backends.len())
            } else {
                backends.push(Arc::new(self.new_backend(url)));
                (true, backends.len())
            }
        };

        if added {
            self.health.start_checking(url);
            exporter::record_pool_size(size);
            tracing::info!(backend = %url, pool_size = size, "Backend added to pool");
        }
        added
    }

    /// Drop every entry matching `url`, cancel its probe, and clear its
    /// metrics aggregates so a later re-add starts from a clean slate.
    pub fn remove(&self, url: &str) {
        let (removed, size) = {
            let mut backends = self.backends.write().unwrap();
            let before = backends.len();
            backends.retain(|b| b.url != url);
            (before != backends.len(), backends.len())
        };

        if removed {
            self.health.stop_checking(url);
            self.metrics.reset_backend(url);
            exporter::record_pool_size(size);
            tracing::info!(backend = %url, pool_size = size, "Backend removed from pool");
        }
    }

    /// Snapshot of backend URLs in pool order.
    pub fn list(&self) -> Vec<String> {
        self.backends
            .read()
            .unwrap()
            .iter()
            .map(|b| b.url.clone())
            .collect()
    }

    /// Pick the next fit backend in round-robin order.
    ///
    /// Each caller takes a distinct cursor ticket, so concurrent callers
    /// start at distinct indices without coordinating. At most one full
    /// rotation is attempted; a candidate must be healthy per the prober
    /// and admitted by its breaker. Returns `None` when the pool is
    /// empty or no backend qualifies.
    pub fn select_next(&self) -> Option<Arc<Backend>> {
        let backends = self.backends.read().unwrap();
        if backends.is_empty() {
            return None;
        }

        let len = backends.len() as u64;
        for _ in 0..backends.len() {
            let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
            let backend = &backends[(ticket % len) as usize];

            if self.health.is_healthy(&backend.url) && backend.breaker.is_available() {
                self.metrics.record_request(&backend.url);
                self.metrics
                    .record_circuit_state(&backend.url, backend.breaker.state());
                return Some(Arc::clone(backend));
            }
        }
        None
    }

    fn new_backend(&self, url: &str) -> Backend {
        Backend::new(
            url.to_string(),
            CircuitBreaker::new(
                self.breaker_config.failure_threshold,
                Duration::from_secs(self.breaker_config.cooldown_secs),
            ),
        )
    }
}

impl BackendRegistry for BackendPool {
    fn add(&self, url: &str) -> bool {
        BackendPool::add(self, url)
    }

    fn remove(&self, url: &str) {
        BackendPool::remove(self, url)
    }

    fn list(&self) -> Vec<String> {
        BackendPool::list(self)
    }
}
