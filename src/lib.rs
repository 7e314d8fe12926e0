//! Tether: fault-tolerant session layer for an external trading terminal
//!
//! # Overview
//!
//! The platform talks to a stateful, flaky external trading terminal to
//! submit orders and receive market data. Tether keeps that link usable:
//!
//! - **Session management** ([`tether_connect`]): one owned session per
//!   terminal endpoint, single-flight connects, supervised reconnects with
//!   backoff and jitter
//! - **Circuit breaking** ([`tether_core_resilience`]): fail fast when the
//!   terminal is down instead of piling retries onto it
//! - **Health probing** ([`tether_pulse`]): an independent periodic probe
//!   that detects dead or degraded links and asks the session layer to
//!   reconnect through a narrow capability
//!
//! ```text
//! caller ──> TerminalLink ──> SessionManager ──> CircuitBreaker ──> transport
//!                 │                  ▲
//!                 │                  │ reconnect() only
//!                 └──> HealthMonitor ┘   (independent timer)
//! ```
//!
//! Every collaborator (transport, credentials, clock, metrics sink) is
//! injected, so instances are isolated and tests run on simulated time.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tether::{LinkConfig, TerminalLink};
//! use tether_connect::{EnvCredentials, TerminalTransport};
//! use tether_core_resilience::{NoopMetrics, SystemClock};
//!
//! # async fn example(transport: Arc<dyn TerminalTransport<()>>) -> Result<(), tether::FailureError> {
//! let config = LinkConfig::from_toml_file(Path::new("tether.toml"))?;
//! let credentials = Arc::new(EnvCredentials::new(
//!     "100042",
//!     config.credentials_ref.clone(),
//!     config.endpoint.clone(),
//! ));
//!
//! let link = TerminalLink::new(
//!     &config,
//!     transport,
//!     credentials,
//!     Arc::new(SystemClock),
//!     Arc::new(NoopMetrics),
//! )?;
//! link.spawn_monitor();
//!
//! let session = link.acquire().await?;
//! // ... submit orders over the session ...
//! link.release(&session).await;
//!
//! link.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;

pub use config::LinkConfig;
pub use tether_connect::{
    CredentialsProvider, EnvCredentials, ProbeTarget, Reconnectable, Session, SessionManager,
    SessionState, StaticCredentials, TerminalTransport,
};
pub use tether_core_resilience::{
    CircuitBreaker, CircuitState, Clock, FailureError, FailureKind, MetricsSink, NoopMetrics,
    ProbeStatus, SystemClock,
};
pub use tether_pulse::{HealthMonitor, HealthPolicy, HealthStatus, ProbeStats};

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One assembled link to one terminal endpoint
///
/// Explicitly constructed and passed by reference to callers, never a
/// process-wide singleton, so tests and multi-terminal deployments run
/// isolated instances.
pub struct TerminalLink<C: Send + 'static> {
    breaker: Arc<CircuitBreaker>,
    manager: Arc<SessionManager<C>>,
    monitor: Arc<HealthMonitor>,
    shutdown: watch::Sender<bool>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> TerminalLink<C> {
    /// Assemble a link from externally supplied configuration and
    /// collaborators
    pub fn new(
        config: &LinkConfig,
        transport: Arc<dyn TerminalTransport<C>>,
        credentials: Arc<dyn CredentialsProvider>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, FailureError> {
        config.validate()?;

        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker_config(),
            clock.clone(),
            metrics.clone(),
        ));

        let manager = Arc::new(SessionManager::new(
            transport,
            credentials,
            breaker.clone(),
            clock.clone(),
            config.session_config(),
        ));

        // The monitor sees the manager only through its narrow capabilities.
        let monitor = Arc::new(HealthMonitor::new(
            manager.clone() as Arc<dyn ProbeTarget>,
            manager.clone() as Arc<dyn Reconnectable>,
            config.health.clone(),
            clock,
            metrics,
        )?);

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            breaker,
            manager,
            monitor,
            shutdown,
            monitor_task: Mutex::new(None),
        })
    }

    /// Get a usable session, connecting if necessary.
    ///
    /// Fails with `Connection`, `Auth`, or `CircuitOpen`.
    pub async fn acquire(&self) -> Result<Arc<Session<C>>, FailureError> {
        self.manager.acquire().await
    }

    /// Return the session after use; the connection stays alive for reuse
    pub async fn release(&self, session: &Session<C>) {
        self.manager.release(session).await;
    }

    /// Tear the session down permanently
    pub async fn close(&self) -> Result<(), FailureError> {
        self.manager.close().await
    }

    /// Last known health snapshot — never blocks
    pub fn get_health(&self) -> Arc<HealthStatus> {
        self.monitor.health()
    }

    /// Current circuit breaker state
    pub fn get_circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// The session manager, for callers that need the full surface
    pub fn manager(&self) -> Arc<SessionManager<C>> {
        self.manager.clone()
    }

    /// The health monitor, for probe stats
    pub fn monitor(&self) -> Arc<HealthMonitor> {
        self.monitor.clone()
    }

    /// Start the periodic health probe task. Idempotent.
    pub fn spawn_monitor(&self) {
        let mut slot = self.monitor_task.lock().unwrap();
        if slot.is_some() {
            return;
        }
        let monitor = self.monitor.clone();
        let shutdown = self.shutdown.subscribe();
        *slot = Some(tokio::spawn(async move {
            monitor.run_until(shutdown).await;
        }));
    }

    /// Stop the probe task and wait for it to finish
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.monitor_task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
