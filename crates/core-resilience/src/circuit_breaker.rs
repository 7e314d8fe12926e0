//! Circuit breaker isolating the terminal from cascading failures
//!
//! Three states:
//! - **Closed**: normal operation, calls pass through. Failures are counted
//!   over a sliding time window so isolated old failures age out instead of
//!   keeping the breaker primed to open.
//! - **Open**: every call is rejected immediately; the transport is never
//!   touched. Once the recovery timeout elapses, the next call moves the
//!   breaker to half-open *before* being attempted.
//! - **HalfOpen**: a bounded quota of trial calls is let through. Any
//!   failure reopens the breaker with a fresh recovery timer; enough
//!   consecutive successes close it and clear the failure history.
//!
//! Open never transitions directly to Closed.
//!
//! Time comes exclusively from the injected [`Clock`] so state transitions
//! can be driven deterministically in tests.

use crate::clock::Clock;
use crate::error::FailureError;
use crate::metrics::MetricsSink;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Requests pass through normally
    Closed,
    /// Requests fail immediately without touching the transport
    Open,
    /// A bounded number of trial requests probe for recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn index(self) -> usize {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for circuit breaker behavior, always supplied externally
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Windowed failure count that opens the circuit
    pub failure_threshold: u32,

    /// How long the circuit stays open before a half-open trial is allowed
    pub recovery_timeout: Duration,

    /// Trial calls admitted while half-open
    pub half_open_max_trials: u32,

    /// Consecutive half-open successes required to close the circuit
    pub success_to_close: u32,

    /// Sliding window over which failures are counted
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_trials: 1,
            success_to_close: 2,
            window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be at least 1".to_string());
        }
        if self.recovery_timeout.is_zero() {
            return Err("recovery_timeout must be greater than 0".to_string());
        }
        if self.half_open_max_trials == 0 {
            return Err("half_open_max_trials must be at least 1".to_string());
        }
        if self.success_to_close == 0 {
            return Err("success_to_close must be at least 1".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Failure instants inside the sliding window (tracked while closed)
    failures: VecDeque<Instant>,
    /// When the circuit last opened
    opened_at: Option<Instant>,
    /// When the current state was entered
    entered_at: Instant,
    half_open_trials: u32,
    half_open_successes: u32,
    /// Cumulative transition counts, indexed [from][to]
    transitions: [[u64; 3]; 3],
}

/// Failure-isolation state machine for one terminal endpoint
///
/// `record_success` / `record_failure` are called by the session layer
/// after every gated operation; both are atomic with any resulting state
/// transition. All state is linearized through one mutex that is never
/// held across an await point.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let entered_at = clock.now();
        Self {
            config,
            clock,
            metrics,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                entered_at,
                half_open_trials: 0,
                half_open_successes: 0,
                transitions: [[0; 3]; 3],
            }),
        }
    }

    /// Gate a call through the breaker.
    ///
    /// Returns `Ok(())` when the call may proceed. While open, returns a
    /// `CircuitOpen` failure without touching anything else; once the
    /// recovery timeout has elapsed the breaker moves to half-open *before*
    /// the call is attempted and admits it as a trial.
    pub fn try_acquire(&self) -> Result<(), FailureError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(inner.entered_at);
                if now.duration_since(opened_at) >= self.config.recovery_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen, now);
                    inner.half_open_trials = 1;
                    Ok(())
                } else {
                    Err(FailureError::circuit_open())
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_trials < self.config.half_open_max_trials {
                    inner.half_open_trials += 1;
                    Ok(())
                } else {
                    Err(FailureError::circuit_open())
                }
            }
        }
    }

    /// Record a successful gated call
    pub fn record_success(&self) {
        self.metrics.record_call_outcome(true);

        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => {
                Self::prune(&mut inner.failures, now, self.config.window);
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_to_close {
                    inner.failures.clear();
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {
                // Open never moves straight to Closed; recovery goes
                // through a half-open trial.
                debug!("success recorded while circuit open; ignoring");
            }
        }
    }

    /// Record a failed gated call
    pub fn record_failure(&self) {
        self.metrics.record_call_outcome(false);

        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => {
                inner.failures.push_back(now);
                Self::prune(&mut inner.failures, now, self.config.window);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    warn!(
                        failures = inner.failures.len(),
                        window_s = self.config.window.as_secs(),
                        "failure threshold reached, opening circuit"
                    );
                    inner.opened_at = Some(now);
                    inner.failures.clear();
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                warn!("half-open trial failed, reopening circuit");
                // Recovery timer restarts from this failure, not from the
                // original opening.
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Failures currently inside the sliding window
    pub fn failure_count(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        Self::prune(&mut inner.failures, now, self.config.window);
        inner.failures.len()
    }

    /// Cumulative number of `from -> to` transitions
    pub fn transition_count(&self, from: CircuitState, to: CircuitState) -> u64 {
        self.inner.lock().unwrap().transitions[from.index()][to.index()]
    }

    /// Time spent in the current state
    pub fn time_in_state(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        self.clock.now().saturating_duration_since(inner.entered_at)
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.transitions[from.index()][to.index()] += 1;
        inner.state = to;
        inner.entered_at = now;
        inner.half_open_trials = 0;
        inner.half_open_successes = 0;
        debug!(%from, %to, "circuit state transition");
        self.metrics.record_state_transition(from, to);
    }

    fn prune(failures: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = failures.front() {
            if now.duration_since(*oldest) > window {
                failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::error::FailureKind;
    use crate::metrics::ProbeStatus;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingMetrics {
        transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
        successes: AtomicU64,
        failures: AtomicU64,
    }

    impl MetricsSink for CountingMetrics {
        fn record_state_transition(&self, from: CircuitState, to: CircuitState) {
            self.transitions.lock().unwrap().push((from, to));
        }

        fn record_probe(&self, _latency_ms: f64, _status: ProbeStatus) {}

        fn record_call_outcome(&self, success: bool) {
            if success {
                self.successes.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_trials: 1,
            success_to_close: 1,
            window: Duration::from_secs(60),
        }
    }

    fn breaker_with(
        config: CircuitBreakerConfig,
    ) -> (CircuitBreaker, Arc<SimulatedClock>, Arc<CountingMetrics>) {
        let clock = Arc::new(SimulatedClock::new());
        let metrics = Arc::new(CountingMetrics::default());
        let breaker = CircuitBreaker::new(config, clock.clone(), metrics.clone());
        (breaker, clock, metrics)
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let (breaker, _clock, _metrics) = breaker_with(config());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 2);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_open_rejects_with_circuit_open_kind() {
        let (breaker, _clock, _metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.kind(), FailureKind::CircuitOpen);
    }

    #[test]
    fn test_window_ages_out_old_failures() {
        let (breaker, clock, _metrics) = breaker_with(config());

        breaker.record_failure();
        breaker.record_failure();

        // Push the first two failures out of the 60s window.
        clock.advance(Duration::from_secs(61));
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[test]
    fn test_success_does_not_clear_window() {
        // Sliding window semantics: a success between failures does not
        // reset the count, aging does.
        let (breaker, _clock, _metrics) = breaker_with(config());

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_after_recovery_timeout_before_attempt() {
        let (breaker, clock, _metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(29));
        assert!(breaker.try_acquire().is_err());
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert!(breaker.try_acquire().is_ok());
        // The transition happened at gate time, before any call ran.
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes_and_resets_failures() {
        let (breaker, clock, _metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(30));
        breaker.try_acquire().unwrap();
        breaker.record_success();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_success_to_close_requires_consecutive_successes() {
        let mut cfg = config();
        cfg.success_to_close = 2;
        cfg.half_open_max_trials = 3;
        let (breaker, clock, _metrics) = breaker_with(cfg);
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(30));
        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens_with_fresh_timer() {
        let (breaker, clock, _metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(30));
        breaker.try_acquire().unwrap();

        // Trial fails 10s into the half-open state.
        clock.advance(Duration::from_secs(10));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The recovery timer restarts from the trial failure, not from
        // the original opening.
        clock.advance(Duration::from_secs(29));
        assert!(breaker.try_acquire().is_err());
        clock.advance(Duration::from_secs(1));
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_half_open_trial_quota() {
        let mut cfg = config();
        cfg.half_open_max_trials = 2;
        cfg.success_to_close = 3;
        let (breaker, clock, _metrics) = breaker_with(cfg);
        for _ in 0..3 {
            breaker.record_failure();
        }

        clock.advance(Duration::from_secs(30));
        assert!(breaker.try_acquire().is_ok());
        assert!(breaker.try_acquire().is_ok());

        let err = breaker.try_acquire().unwrap_err();
        assert_eq!(err.kind(), FailureKind::CircuitOpen);
    }

    #[test]
    fn test_open_never_straight_to_closed() {
        let (breaker, _clock, _metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_transition_counters_and_metrics() {
        let (breaker, clock, metrics) = breaker_with(config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        clock.advance(Duration::from_secs(30));
        breaker.try_acquire().unwrap();
        breaker.record_success();

        assert_eq!(
            breaker.transition_count(CircuitState::Closed, CircuitState::Open),
            1
        );
        assert_eq!(
            breaker.transition_count(CircuitState::Open, CircuitState::HalfOpen),
            1
        );
        assert_eq!(
            breaker.transition_count(CircuitState::HalfOpen, CircuitState::Closed),
            1
        );
        assert_eq!(
            breaker.transition_count(CircuitState::Closed, CircuitState::HalfOpen),
            0
        );

        let transitions = metrics.transitions.lock().unwrap();
        assert_eq!(
            *transitions,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
        assert_eq!(metrics.successes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failures.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_time_in_state_tracks_clock() {
        let (breaker, clock, _metrics) = breaker_with(config());
        clock.advance(Duration::from_secs(5));
        assert_eq!(breaker.time_in_state(), Duration::from_secs(5));

        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.time_in_state(), Duration::ZERO);
        clock.advance(Duration::from_secs(7));
        assert_eq!(breaker.time_in_state(), Duration::from_secs(7));
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut cfg = config();
        cfg.failure_threshold = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.recovery_timeout = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.half_open_max_trials = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.success_to_close = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.window = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }
}
