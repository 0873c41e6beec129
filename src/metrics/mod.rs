//! Request metrics aggregation.
//!
//! One mutex covers all per-backend maps and the recent-request ring so
//! `record_request_complete` stays an atomic composite: the ring, the
//! counters, the error rate, and the response-time average always agree
//! with each other. Critical sections are short and never contain I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

use crate::resilience::CircuitState;

/// How many completed requests the ring retains.
const RECENT_CAPACITY: usize = 100;

/// One completed forwarding attempt, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub id: String,
    pub url: String,
    #[serde(serialize_with = "serialize_epoch_millis")]
    pub timestamp: SystemTime,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_millis")]
    pub duration: Duration,
    pub success: bool,
}

#[derive(Debug, Default)]
struct MetricsInner {
    request_counts: HashMap<String, u64>,
    error_counts: HashMap<String, u64>,
    error_rates: HashMap<String, f64>,
    response_times: HashMap<String, Duration>,
    circuit_states: HashMap<String, CircuitState>,
    recent: VecDeque<RequestInfo>,
}

/// Consistent copy of all aggregates, served on the admin plane.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub request_counts: HashMap<String, u64>,
    #[serde(serialize_with = "serialize_duration_map_millis")]
    pub response_times: HashMap<String, Duration>,
    pub error_rates: HashMap<String, f64>,
    pub circuit_states: HashMap<String, CircuitState>,
    pub recent_requests: Vec<RequestInfo>,
}

/// Thread-safe metrics store, shared by the selector and the forwarder.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request handed to `url` by the selector.
    pub fn record_request(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        *inner.request_counts.entry(url.to_string()).or_default() += 1;
    }

    /// Record the circuit state observed for `url` at selection time.
    pub fn record_circuit_state(&self, url: &str, state: CircuitState) {
        let mut inner = self.inner.lock().unwrap();
        inner.circuit_states.insert(url.to_string(), state);
    }

    /// Fold `sample` into the exponential moving average for `url`.
    ///
    /// The weighting is `(old * 9 + sample) / 10` in integer nanosecond
    /// arithmetic; the first sample seeds the average directly.
    pub fn record_response_time(&self, url: &str, sample: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let updated = match inner.response_times.get(url) {
            Some(old) => (*old * 9 + sample) / 10,
            None => sample,
        };
        inner.response_times.insert(url.to_string(), updated);
    }

    /// Count an error for `url` and refresh its error rate.
    pub fn record_error(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        *inner.error_counts.entry(url.to_string()).or_default() += 1;
        let requests = inner.request_counts.get(url).copied().unwrap_or(0);
        if requests > 0 {
            let errors = inner.error_counts.get(url).copied().unwrap_or(0);
            inner
                .error_rates
                .insert(url.to_string(), errors as f64 / requests as f64);
        }
    }

    /// Record a finished forwarding attempt in one critical section:
    /// prepend to the ring, bump the request counter, account the error,
    /// and fold the duration into the moving average.
    pub fn record_request_complete(&self, id: &str, url: &str, duration: Duration, success: bool) {
        let mut inner = self.inner.lock().unwrap();

        inner.recent.push_front(RequestInfo {
            id: id.to_string(),
            url: url.to_string(),
            timestamp: SystemTime::now(),
            duration,
            success,
        });
        inner.recent.truncate(RECENT_CAPACITY);

        *inner.request_counts.entry(url.to_string()).or_default() += 1;

        if !success {
            *inner.error_counts.entry(url.to_string()).or_default() += 1;
            let requests = inner.request_counts.get(url).copied().unwrap_or(0);
            let errors = inner.error_counts.get(url).copied().unwrap_or(0);
            inner
                .error_rates
                .insert(url.to_string(), errors as f64 / requests as f64);
        }

        let updated = match inner.response_times.get(url) {
            Some(old) => (*old * 9 + duration) / 10,
            None => duration,
        };
        inner.response_times.insert(url.to_string(), updated);
    }

    /// Drop every aggregate for `url`. A backend removed from the pool
    /// starts from zero if it is ever added back; the recent ring keeps
    /// its historical entries.
    pub fn reset_backend(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.request_counts.remove(url);
        inner.error_counts.remove(url);
        inner.error_rates.remove(url);
        inner.response_times.remove(url);
        inner.circuit_states.remove(url);
    }

    /// Deep copy of all aggregates and the recent ring.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();
        MetricsSnapshot {
            request_counts: inner.request_counts.clone(),
            response_times: inner.response_times.clone(),
            error_rates: inner.error_rates.clone(),
            circuit_states: inner.circuit_states.clone(),
            recent_requests: inner.recent.iter().cloned().collect(),
        }
    }
}

fn serialize_epoch_millis<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    let millis = t
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    s.serialize_u64(millis)
}

fn serialize_duration_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn serialize_duration_map_millis<S: Serializer>(
    map: &HashMap<String, Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut out = s.serialize_map(Some(map.len()))?;
    for (url, duration) in map {
        out.serialize_entry(url, &(duration.as_millis() as u64))?;
    }
    out.end()
}
