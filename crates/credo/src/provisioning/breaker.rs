// Circuit breaker guarding the downstream profile service.
//
// ```text
// ┌────────┐  ≥50% errors  ┌──────┐   cool-down    ┌───────────┐
// │ Closed ├───────────────►│ Open ├───────────────►│ Half-Open │
// └────┬───┘               └──────┘                └─────┬─────┘
//      │                       ▲                         │
//      │                       │  probe failure          │ probe success
//      │                       └─────────────────────────┤
//      │◄────────────────────────────────────────────────┘
// ```
//
// One instance is shared by every concurrent provisioning call in the
// process; aggregating cross-request failure signal is its entire purpose.
// Trip condition is an error ratio over a rolling sample of recent
// outcomes, and the half-open state admits exactly one probe.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use credo_core::logger::AuthLogger;
use credo_core::metrics::AuthMetrics;
use credo_core::options::BreakerOptions;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation — calls flow through.
    Closed,
    /// Circuit tripped — calls fail fast without network I/O.
    Open,
    /// Probing — exactly one trial call is allowed through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Returned by [`CircuitBreaker::check`] while calls are being rejected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit breaker is open, retry after {retry_after:?}")]
pub struct BreakerOpen {
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Rolling sample of recent outcomes; `false` = failure.
    samples: VecDeque<bool>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Shared, internally-synchronized breaker. Injected into every caller —
/// never an ambient singleton, so tests construct isolated instances.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerOptions,
    inner: Mutex<Inner>,
    metrics: Arc<dyn AuthMetrics>,
    logger: AuthLogger,
}

impl CircuitBreaker {
    pub fn new(config: BreakerOptions, metrics: Arc<dyn AuthMetrics>, logger: AuthLogger) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                samples: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
            metrics,
            logger,
        }
    }

    /// Whether a call may proceed.
    ///
    /// In the open state, once the cool-down has elapsed the breaker moves
    /// to half-open and admits the caller as the single probe.
    pub fn check(&self) -> Result<(), BreakerOpen> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    self.transition_logged("half-open", "cool-down elapsed, admitting probe");
                    Ok(())
                } else {
                    Err(BreakerOpen {
                        retry_after: self.config.cooldown - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    // One probe at a time; everyone else keeps failing fast.
                    Err(BreakerOpen {
                        retry_after: self.config.cooldown,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match inner.state {
            CircuitState::Closed => push_sample(&mut inner.samples, self.config.sample_size, true),
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.samples.clear();
                inner.opened_at = None;
                inner.probe_in_flight = false;
                self.transition_logged("closed", "probe succeeded, downstream recovered");
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call (error or timeout).
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match inner.state {
            CircuitState::Closed => {
                push_sample(&mut inner.samples, self.config.sample_size, false);
                if self.should_trip(&inner.samples) {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.probe_in_flight = false;
                    self.transition_logged("open", "error ratio exceeded, failing fast");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                self.transition_logged("open", "probe failed, reopening");
            }
            CircuitState::Open => {}
        }
    }

    /// Current state. An elapsed cool-down reports as half-open.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = false;
                }
            }
        }
        inner.state
    }

    fn should_trip(&self, samples: &VecDeque<bool>) -> bool {
        if samples.len() < self.config.min_samples {
            return false;
        }
        let failures = samples.iter().filter(|ok| !**ok).count();
        failures as f64 / samples.len() as f64 >= self.config.error_ratio
    }

    fn transition_logged(&self, state: &str, reason: &str) {
        self.metrics.record_breaker_transition(state);
        self.logger
            .warn(&format!("provisioning circuit breaker {state}: {reason}"));
    }
}

fn push_sample(samples: &mut VecDeque<bool>, capacity: usize, ok: bool) {
    if samples.len() == capacity {
        samples.pop_front();
    }
    samples.push_back(ok);
}
