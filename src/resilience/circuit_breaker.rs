//! Circuit breaker for backend protection.
//!
//! Each backend owns one breaker; state is local to that backend.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     failure count reaches threshold
//! Open     → HalfOpen: cooldown elapsed since the last failure
//! HalfOpen → Closed:   trial request succeeds
//! HalfOpen → Open:     trial request fails
//! ```
//!
//! The availability check itself performs the `Open → HalfOpen` transition,
//! so a recovering backend gets exactly one trial per cooldown window even
//! when many request handlers race on the same breaker.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,
    /// Backend assumed down, requests fail fast.
    Open,
    /// Backend may have recovered, one trial allowed.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Per-backend circuit breaker.
///
/// Failures accumulate across the lifetime of the `Closed` state; a success
/// does not reset the count. The count is reset on every transition into
/// `Closed` and when an `Open` breaker moves to `HalfOpen`.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            failure_threshold,
            cooldown,
        }
    }

    /// Whether a request may be sent through right now.
    ///
    /// An `Open` breaker whose cooldown has elapsed transitions to
    /// `HalfOpen` here and admits the caller as the trial request.
    pub fn is_available(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map(|at| at.elapsed() > self.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.failure_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request. Closes the breaker if the caller was
    /// the `HalfOpen` trial; a success while `Closed` changes nothing.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
        }
    }

    /// Record a failed request, opening the breaker when the threshold is
    /// reached or when the `HalfOpen` trial fails.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.failure_threshold => {
                inner.state = CircuitState::Open;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    /// Current state, for metrics snapshots.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAILURE_THRESHOLD, Self::DEFAULT_COOLDOWN)
    }
}
