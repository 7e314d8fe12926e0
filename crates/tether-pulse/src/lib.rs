//! Tether Pulse: independent periodic health prober
//!
//! The prober runs on its own timer, decoupled from request traffic:
//!
//! ```text
//! ┌─────────────┐
//! │  Liveness   │──> ping the terminal, measure round-trip latency
//! └──────┬──────┘
//!        v
//! ┌─────────────┐
//! │  Auth       │──> is the login still accepted?
//! └──────┬──────┘
//!        v
//! ┌─────────────┐
//! │  Freshness  │──> age of the last market update vs threshold
//! └──────┬──────┘
//!        v
//! ┌─────────────┐
//! │  Verdict    │──> Healthy | Degraded | Unhealthy
//! └──────┬──────┘
//!        │ unhealthy?
//!        v
//!   narrow reconnect capability (never the circuit breaker)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_pulse::{HealthMonitor, HealthPolicy};
//! use tether_connect::{ProbeTarget, Reconnectable};
//! use tether_core_resilience::{NoopMetrics, SystemClock};
//! use tokio::sync::watch;
//!
//! # async fn example(
//! #     target: Arc<dyn ProbeTarget>,
//! #     reconnector: Arc<dyn Reconnectable>,
//! # ) -> Result<(), tether_core_resilience::FailureError> {
//! let monitor = Arc::new(HealthMonitor::new(
//!     target,
//!     reconnector,
//!     HealthPolicy::default(),
//!     Arc::new(SystemClock),
//!     Arc::new(NoopMetrics),
//! )?);
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn({
//!     let monitor = monitor.clone();
//!     async move { monitor.run_until(shutdown_rx).await }
//! });
//!
//! // Readers never block on an in-flight probe.
//! let health = monitor.health();
//! println!("link is {}", health.overall);
//! # Ok(())
//! # }
//! ```

pub mod monitor;
pub mod policy;
pub mod status;

pub use monitor::HealthMonitor;
pub use policy::HealthPolicy;
pub use status::{HealthStatus, ProbeStats};
