//! Probing policy for the health monitor

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health monitor operational policy, always supplied externally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Seconds between probe cycles
    pub probe_interval_s: u64,

    /// A market feed older than this many seconds is considered stale
    pub feed_staleness_threshold_s: u64,

    /// Liveness latency above this many milliseconds degrades the link
    pub latency_warn_ms: u64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            probe_interval_s: 30,
            feed_staleness_threshold_s: 60,
            latency_warn_ms: 500,
        }
    }
}

impl HealthPolicy {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_s)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.feed_staleness_threshold_s)
    }

    pub fn latency_warn(&self) -> Duration {
        Duration::from_millis(self.latency_warn_ms)
    }

    /// Validate the policy configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.probe_interval_s == 0 {
            return Err("probe_interval_s must be greater than 0".to_string());
        }
        if self.feed_staleness_threshold_s == 0 {
            return Err("feed_staleness_threshold_s must be greater than 0".to_string());
        }
        if self.latency_warn_ms == 0 {
            return Err("latency_warn_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
