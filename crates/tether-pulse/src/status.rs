//! Health snapshots and probe statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tether_core_resilience::metrics::ProbeStatus;

/// Snapshot of the link's health as of the last completed probe cycle
///
/// A new snapshot replaces the previous one atomically each cycle; readers
/// always see the last known value and are never blocked by an in-flight
/// probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Connection is up and answered the liveness check
    pub connected: bool,

    /// The terminal still accepts the session's login
    pub authenticated: bool,

    /// The market feed updated within the staleness threshold
    pub data_feed_fresh: bool,

    /// Round-trip latency of the liveness check
    pub latency_ms: f64,

    /// Wall-clock time the probe completed, `None` before the first cycle
    pub last_probe_time: Option<DateTime<Utc>>,

    /// Aggregated verdict
    pub overall: ProbeStatus,

    /// Cause captured when a probe failed internally
    pub detail: Option<String>,
}

impl HealthStatus {
    /// Snapshot reported before the first probe completes
    pub(crate) fn startup() -> Self {
        Self {
            connected: false,
            authenticated: false,
            data_feed_fresh: false,
            latency_ms: 0.0,
            last_probe_time: None,
            overall: ProbeStatus::Unhealthy,
            detail: Some("no probe completed yet".to_string()),
        }
    }

    /// Aggregation policy:
    /// - `Unhealthy` if connection or authentication is broken
    /// - `Degraded` if the feed is stale or latency exceeds the warn
    ///   threshold while connection and auth are fine
    /// - `Healthy` otherwise
    pub fn aggregate(
        connected: bool,
        authenticated: bool,
        data_feed_fresh: bool,
        latency: Duration,
        latency_warn: Duration,
    ) -> ProbeStatus {
        if !connected || !authenticated {
            ProbeStatus::Unhealthy
        } else if !data_feed_fresh || latency > latency_warn {
            ProbeStatus::Degraded
        } else {
            ProbeStatus::Healthy
        }
    }
}

/// Counters across the monitor's lifetime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    /// Total probe cycles completed
    pub probes: u64,

    /// Cycles that ended healthy
    pub healthy: u64,

    /// Cycles that ended degraded
    pub degraded: u64,

    /// Cycles that ended unhealthy
    pub unhealthy: u64,

    /// Reconnects handed to the session layer
    pub reconnects_triggered: u64,
}

impl ProbeStats {
    pub(crate) fn record(&mut self, status: ProbeStatus) {
        self.probes += 1;
        match status {
            ProbeStatus::Healthy => self.healthy += 1,
            ProbeStatus::Degraded => self.degraded += 1,
            ProbeStatus::Unhealthy => self.unhealthy += 1,
        }
    }

    /// Fraction of cycles that ended healthy (1.0 when no probes ran)
    pub fn healthy_ratio(&self) -> f64 {
        if self.probes == 0 {
            1.0
        } else {
            self.healthy as f64 / self.probes as f64
        }
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Probes: {} total | {} healthy ({:.1}%) | {} degraded | {} unhealthy | {} reconnects",
            self.probes,
            self.healthy,
            self.healthy_ratio() * 100.0,
            self.degraded,
            self.unhealthy,
            self.reconnects_triggered
        )
    }
}
