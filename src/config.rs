//! Externally supplied configuration for a terminal link
//!
//! Nothing here is hardcoded into the resilience logic: the wiring layer
//! converts these sections into the component configs and passes them down.
//! Loadable from TOML:
//!
//! ```toml
//! endpoint = "mt.broker.example:443"
//! credentials_ref = "TETHER_TERMINAL_PASSWORD"
//! operation_timeout_s = 10
//!
//! [breaker]
//! failure_threshold = 5
//! recovery_timeout_s = 30
//! half_open_max_trials = 1
//! success_to_close = 2
//! window_s = 60
//!
//! [backoff]
//! initial_delay_ms = 200
//! max_delay_ms = 60000
//! multiplier = 2.0
//! jitter = 0.3
//! max_attempts = 5
//!
//! [health]
//! probe_interval_s = 30
//! feed_staleness_threshold_s = 60
//! latency_warn_ms = 500
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tether_connect::SessionConfig;
use tether_core_resilience::backoff::BackoffPolicy;
use tether_core_resilience::circuit_breaker::CircuitBreakerConfig;
use tether_core_resilience::error::FailureError;
use tether_pulse::HealthPolicy;

/// Top-level link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Terminal endpoint, e.g. "mt.broker.example:443"
    pub endpoint: String,

    /// Name of the credential source handed to the credentials provider
    /// (environment variable, keyring entry) — never the secret itself
    pub credentials_ref: String,

    /// Deadline in seconds for every remote operation
    pub operation_timeout_s: u64,

    /// Circuit breaker section
    pub breaker: BreakerSection,

    /// Reconnect backoff section
    pub backoff: BackoffSection,

    /// Health probing section
    pub health: HealthPolicy,
}

/// Circuit breaker settings
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub recovery_timeout_s: u64,
    pub half_open_max_trials: u32,
    pub success_to_close: u32,
    pub window_s: u64,
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffSection {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl LinkConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, FailureError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            FailureError::validation(format!("failed to read config {}", path.display()))
                .with_cause(err)
        })?;
        let config: Self = toml::from_str(&raw).map_err(|err| {
            FailureError::validation(format!("invalid config {}", path.display())).with_cause(err)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), FailureError> {
        if self.endpoint.trim().is_empty() {
            return Err(FailureError::validation("endpoint must not be empty"));
        }
        if self.credentials_ref.trim().is_empty() {
            return Err(FailureError::validation("credentials_ref must not be empty"));
        }
        if self.operation_timeout_s == 0 {
            return Err(FailureError::validation(
                "operation_timeout_s must be greater than 0",
            ));
        }
        self.breaker_config()
            .validate()
            .map_err(|msg| FailureError::validation(format!("breaker: {msg}")))?;
        self.backoff_policy()
            .validate()
            .map_err(|msg| FailureError::validation(format!("backoff: {msg}")))?;
        self.health
            .validate()
            .map_err(|msg| FailureError::validation(format!("health: {msg}")))?;
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_s)
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            recovery_timeout: Duration::from_secs(self.breaker.recovery_timeout_s),
            half_open_max_trials: self.breaker.half_open_max_trials,
            success_to_close: self.breaker.success_to_close,
            window: Duration::from_secs(self.breaker.window_s),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(self.backoff.initial_delay_ms),
            max_delay: Duration::from_millis(self.backoff.max_delay_ms),
            multiplier: self.backoff.multiplier,
            jitter: self.backoff.jitter,
            max_attempts: self.backoff.max_attempts,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            operation_timeout: self.operation_timeout(),
            backoff: self.backoff_policy(),
        }
    }
}
