//! Exponential backoff with jitter for reconnect attempts
//!
//! The policy is pure data and the schedule is a pure state machine: it
//! computes delays but never sleeps. Callers sleep on their injected clock,
//! which keeps retry timing fully deterministic under test.

use rand::Rng;
use std::time::Duration;

/// Backoff policy for a sequence of retry attempts
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Cap applied to the exponential curve (jitter is added on top)
    pub max_delay: Duration,

    /// Multiplier applied to the delay on each successive retry
    pub multiplier: f64,

    /// Jitter factor (0.0-1.0); each delay is stretched by a random
    /// fraction in `[0, jitter)` to prevent thundering herd
    pub jitter: f64,

    /// Maximum total attempts, including the first
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.3,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Validate the policy configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("jitter must be within 0.0..=1.0".to_string());
        }
        if self.initial_delay > self.max_delay {
            return Err("initial_delay must not exceed max_delay".to_string());
        }
        Ok(())
    }
}

/// Tracks attempts through one retry sequence and yields the next delay
#[derive(Debug)]
pub struct BackoffSchedule {
    policy: BackoffPolicy,
    attempt: u32,
}

impl BackoffSchedule {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Record a failed attempt and return the delay before the next one.
    ///
    /// Returns `None` once the attempt budget is exhausted; the failure
    /// that consumed the last attempt should surface to the caller.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.policy.max_attempts {
            return None;
        }

        let exponent = self.policy.multiplier.powi(self.attempt as i32 - 1);
        let base = self.policy.initial_delay.as_secs_f64() * exponent;
        let capped = base.min(self.policy.max_delay.as_secs_f64());

        let delayed = if self.policy.jitter > 0.0 {
            let jitter = rand::rng().random_range(0.0..self.policy.jitter);
            capped * (1.0 + jitter)
        } else {
            capped
        };

        Some(Duration::from_secs_f64(delayed))
    }

    /// Attempts recorded so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Start the sequence over (e.g. after a successful attempt)
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
