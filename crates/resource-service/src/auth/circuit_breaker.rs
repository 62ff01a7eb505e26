//! Circuit breaker guarding calls to the identity service.
//!
//! When the identity service is down, every request would otherwise wait out
//! the full validation timeout before failing closed. After enough
//! consecutive upstream failures the breaker opens and requests fail closed
//! immediately, then a single probe is let through once the recovery timeout
//! has elapsed.
//!
//! ```text
//! ┌────────┐  failure_threshold  ┌──────┐  recovery_timeout  ┌──────────┐
//! │ Closed │ ──────reached─────→ │ Open │ ────elapsed─────→  │ HalfOpen │
//! └────────┘                     └──────┘ ←──probe fails──── └──────────┘
//!      ↑                                                          │
//!      └───────────────────── probe succeeds ─────────────────────┘
//! ```
//!
//! Only upstream failures count. A `401` from the identity service is a
//! healthy answer about a bad credential.

use crate::observability::metrics::record_circuit_state;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through.
    Closed,
    /// Requests fail fast until `until`.
    Open { until: Instant },
    /// A probe is in flight; other requests fail fast.
    HalfOpen,
}

impl CircuitState {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Longest time the circuit may stay open before a probe.
pub const MAX_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe.
    pub recovery_timeout: Duration,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    probe_started: Option<Instant>,
    config: CircuitBreakerConfig,
}

/// Thread-safe circuit breaker. Clones share state.
///
/// Critical sections are short and never span I/O.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    /// Create a closed breaker. `recovery_timeout` is clamped to [`MAX_RECOVERY_TIMEOUT`].
    pub fn new(mut config: CircuitBreakerConfig) -> Self {
        config.recovery_timeout = config.recovery_timeout.min(MAX_RECOVERY_TIMEOUT);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_started: None,
                config,
            })),
        }
    }

    /// Whether a request may go upstream now.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open { until } => {
                if Instant::now() >= until {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started = Some(Instant::now());
                    record_circuit_state("half_open");
                    tracing::info!(
                        target: "resource.auth.circuit_breaker",
                        previous_state = "open",
                        new_state = "half_open",
                        "Circuit breaker letting a probe through"
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                // A probe whose caller went away never reports back
                let probe_stale = inner
                    .probe_started
                    .map_or(true, |started| started.elapsed() >= inner.config.recovery_timeout);
                if probe_stale {
                    inner.probe_started = Some(Instant::now());
                }
                probe_stale
            }
        }
    }

    /// Record a healthy upstream answer.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            record_circuit_state("closed");
            tracing::info!(
                target: "resource.auth.circuit_breaker",
                previous_state = "half_open",
                new_state = "closed",
                "Circuit breaker closed after successful probe"
            );
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_started = None;
    }

    /// Record an upstream failure (network error, timeout, 5xx).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= inner.config.failure_threshold {
                    inner.state = CircuitState::Open {
                        until: Instant::now() + inner.config.recovery_timeout,
                    };
                    record_circuit_state("open");
                    tracing::warn!(
                        target: "resource.auth.circuit_breaker",
                        consecutive_failures = inner.consecutive_failures,
                        recovery_timeout_secs = inner.config.recovery_timeout.as_secs(),
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open {
                    until: Instant::now() + inner.config.recovery_timeout,
                };
                inner.probe_started = None;
                record_circuit_state("open");
                tracing::warn!(
                    target: "resource.auth.circuit_breaker",
                    previous_state = "half_open",
                    new_state = "open",
                    "Circuit breaker re-opened after probe failure"
                );
            }
            CircuitState::Open { .. } => {}
        }
    }

    /// Current state, without transitioning.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}
