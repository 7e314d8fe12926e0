//! Tether Core Resilience: pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! Building blocks for keeping a flaky external dependency usable:
//!
//! - **Error taxonomy**: one discriminated [`FailureError`] with a `kind`
//!   field, retryability and breaker-accounting predicates, and a
//!   correlation bundle for structured logging
//! - **Circuit breaker**: fails fast when the dependency is unhealthy,
//!   probes for recovery through half-open trials
//! - **Backoff**: exponential retry delays with jitter, computed but never
//!   slept — callers sleep on their injected clock
//! - **Clock**: the single source of time, swappable for a simulated clock
//!   in tests
//! - **Metrics sink**: outbound telemetry seam for external observability
//!   tooling
//!
//! # Key principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - The terminal's wire protocol
//! - Session lifecycle or credentials
//! - Application-specific concerns
//!
//! # Usage example
//!
//! ```
//! use tether_core_resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, CircuitState, NoopMetrics, SystemClock,
//! };
//! use std::sync::Arc;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(NoopMetrics),
//! );
//!
//! // Gate a call, then report how it went.
//! if breaker.try_acquire().is_ok() {
//!     // ... perform the call ...
//!     breaker.record_success();
//! }
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod metrics;

// Re-export main types for convenience
pub use backoff::{BackoffPolicy, BackoffSchedule};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{with_deadline, Clock, SimulatedClock, SystemClock};
pub use error::{ErrorContext, FailureError, FailureKind};
pub use metrics::{MetricsSink, NoopMetrics, ProbeStatus};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use tether_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::backoff::{BackoffPolicy, BackoffSchedule};
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::clock::{with_deadline, Clock, SimulatedClock, SystemClock};
    pub use super::error::{FailureError, FailureKind};
    pub use super::metrics::{MetricsSink, NoopMetrics, ProbeStatus};
}
