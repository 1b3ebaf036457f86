// Pluggable metrics sink.
//
// All methods default to no-ops, so implementations only override what they
// collect. `FacadeMetrics` forwards to whatever `metrics::Recorder` is
// installed in the process (Prometheus exporter, StatsD, ...).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Metrics sink shared by the registration and login paths and the
/// provisioning resilience layer.
pub trait AuthMetrics: Send + Sync + fmt::Debug {
    /// Counts one terminal outcome of an operation.
    ///
    /// - `operation`: "register", "login", "refresh".
    /// - `outcome`: "success" or the error code that ended the attempt.
    fn record_attempt(&self, operation: &str, outcome: &str) {
        let _ = (operation, outcome);
    }

    /// Records wall-clock latency of a completed operation.
    fn record_duration(&self, operation: &str, outcome: &str, duration: Duration) {
        let _ = (operation, outcome, duration);
    }

    /// Records a circuit breaker state transition
    /// ("open", "half-open", "closed").
    fn record_breaker_transition(&self, state: &str) {
        let _ = state;
    }
}

/// No-op sink; the default when nothing is configured.
#[derive(Debug, Clone, Copy)]
pub struct NoopMetrics;

impl AuthMetrics for NoopMetrics {}

/// Sink forwarding to the `metrics` crate facade.
#[derive(Debug, Clone, Copy)]
pub struct FacadeMetrics;

mod metric_names {
    pub const ATTEMPTS_TOTAL: &str = "credo_auth_attempts_total";
    pub const DURATION_SECONDS: &str = "credo_auth_duration_seconds";
    pub const BREAKER_TRANSITIONS_TOTAL: &str = "credo_breaker_transitions_total";
}

impl AuthMetrics for FacadeMetrics {
    fn record_attempt(&self, operation: &str, outcome: &str) {
        metrics::counter!(
            metric_names::ATTEMPTS_TOTAL,
            "operation" => operation.to_owned(),
            "outcome" => outcome.to_owned(),
        )
        .increment(1);
    }

    fn record_duration(&self, operation: &str, outcome: &str, duration: Duration) {
        metrics::histogram!(
            metric_names::DURATION_SECONDS,
            "operation" => operation.to_owned(),
            "outcome" => outcome.to_owned(),
        )
        .record(duration.as_secs_f64());
    }

    fn record_breaker_transition(&self, state: &str) {
        metrics::counter!(
            metric_names::BREAKER_TRANSITIONS_TOTAL,
            "state" => state.to_owned(),
        )
        .increment(1);
    }
}

/// The default sink.
pub fn default_metrics() -> Arc<dyn AuthMetrics> {
    Arc::new(NoopMetrics)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingMetrics {
        attempts: AtomicU64,
        durations: AtomicU64,
    }

    impl AuthMetrics for CountingMetrics {
        fn record_attempt(&self, _operation: &str, _outcome: &str) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn record_duration(&self, _operation: &str, _outcome: &str, _duration: Duration) {
            self.durations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_custom_sink_receives_calls() {
        let sink = CountingMetrics::default();
        sink.record_attempt("register", "success");
        sink.record_attempt("register", "CONFLICT");
        sink.record_duration("register", "success", Duration::from_millis(12));

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(sink.durations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_noop_sink_accepts_everything() {
        let sink = NoopMetrics;
        sink.record_attempt("login", "success");
        sink.record_duration("login", "success", Duration::from_secs(1));
        sink.record_breaker_transition("open");
    }
}
