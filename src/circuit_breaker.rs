// =============================================================================
// circuit_breaker.rs - KNOWING WHEN TO STOP ASKING
// =============================================================================
//
// Every upstream we talk to (the data store, DART, the chat assistant) sits
// behind one of these. When a service fails `failure_threshold` times in a
// row the breaker opens and further calls are refused on the spot, which
// turns a thirty-second hang into an immediate apology. After `reset_timeout`
// one probe is let through (half-open); `success_threshold` good probes close
// the breaker again, a single bad one re-opens it.
//
// `call` is the only entry point adapters use: it checks the gate, applies
// the per-request deadline, and books the outcome.
// =============================================================================

use parking_lot::RwLock;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::ServiceError;

/// Gate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CircuitState {
    /// Calls flow through.
    Closed,
    /// Calls are refused until the reset timeout has elapsed.
    Open,
    /// Probing whether the service has recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Tuning knobs shared by every breaker in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
    total_trips: u64,
}

/// A named circuit breaker guarding one upstream service.
pub struct CircuitBreaker {
    name: &'static str,
    settings: BreakerSettings,
    inner: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, settings: BreakerSettings) -> Self {
        debug!(
            service = name,
            failure_threshold = settings.failure_threshold,
            reset_timeout_secs = settings.reset_timeout.as_secs(),
            success_threshold = settings.success_threshold,
            "Circuit breaker armed"
        );
        Self {
            name,
            settings,
            inner: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
                total_trips: 0,
            }),
        }
    }

    /// Runs `request` if the gate allows it, bounded by `deadline`.
    ///
    /// An open breaker refuses with [`ServiceError::CircuitOpen`] without
    /// polling the future. An expired deadline counts as a failure and is
    /// reported as [`ServiceError::Timeout`].
    pub async fn call<T, F>(&self, deadline: Duration, request: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        if !self.allow_request() {
            return Err(ServiceError::CircuitOpen(self.name.to_string()));
        }

        let outcome = match tokio::time::timeout(deadline, request).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                service: self.name,
                secs: deadline.as_secs(),
            }),
        };

        match &outcome {
            Ok(_) => self.record_success(),
            Err(err) => {
                warn!(service = self.name, error = %err, "Upstream call failed");
                self.record_failure();
            }
        }
        outcome
    }

    /// Whether a request may go out right now. Moves Open to HalfOpen once
    /// the reset timeout has passed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.settings.reset_timeout);
                if cooled_down {
                    info!(service = self.name, "Circuit OPEN -> HALF_OPEN, sending a probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_successes = 0;
                } else {
                    warn!(service = self.name, "Circuit OPEN, request refused");
                }
                cooled_down
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.settings.success_threshold {
                    info!(service = self.name, "Circuit HALF_OPEN -> CLOSED, service recovered");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.probe_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    warn!(
                        service = self.name,
                        failures = inner.consecutive_failures,
                        "Circuit CLOSED -> OPEN"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.total_trips += 1;
                }
            }
            CircuitState::HalfOpen => {
                warn!(service = self.name, "Probe failed, circuit HALF_OPEN -> OPEN");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.total_trips += 1;
            }
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.read();
        CircuitBreakerSnapshot {
            service: self.name,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_trips: inner.total_trips,
        }
    }
}

/// Serializable view of a breaker, logged alongside the dialogue metrics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerSnapshot {
    pub service: &'static str,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub total_trips: u64,
}
