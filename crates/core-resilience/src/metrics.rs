//! Metrics sink consumed by external observability tooling
//!
//! The link reports what happened; it never aggregates or exports metrics
//! itself. Wire a real sink (Prometheus bridge, statsd, ...) in the host
//! application, or leave the default `NoopMetrics` in place.

use crate::circuit_breaker::CircuitState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregated outcome of one health probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// All checks passed and latency is below the warn threshold
    Healthy,

    /// Connection and auth are fine, but the data feed is stale or
    /// latency is elevated
    Degraded,

    /// Connection or authentication is broken
    Unhealthy,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Degraded => "degraded",
            ProbeStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for link telemetry
pub trait MetricsSink: Send + Sync {
    /// A circuit breaker state transition occurred
    fn record_state_transition(&self, from: CircuitState, to: CircuitState);

    /// A health probe cycle completed
    fn record_probe(&self, latency_ms: f64, status: ProbeStatus);

    /// A gated terminal call completed
    fn record_call_outcome(&self, success: bool);
}

/// Sink that discards everything; the default when no observability
/// stack is wired in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_state_transition(&self, _from: CircuitState, _to: CircuitState) {}

    fn record_probe(&self, _latency_ms: f64, _status: ProbeStatus) {}

    fn record_call_outcome(&self, _success: bool) {}
}
