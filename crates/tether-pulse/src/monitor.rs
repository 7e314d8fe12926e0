//! Health monitor: the independent probe loop
//!
//! Probing runs on its own timer, decoupled from request traffic. Each
//! cycle performs three checks — connection liveness (with measured
//! round-trip latency), login validity, and market-feed freshness — and
//! aggregates them into one verdict.
//!
//! The monitor mutates nothing outside itself except through the narrow
//! [`Reconnectable`] capability, and it never touches the circuit breaker:
//! probe outcomes must not be conflated with real call-failure accounting,
//! or probing noise could open the breaker for traffic that is otherwise
//! succeeding.

use crate::policy::HealthPolicy;
use crate::status::{HealthStatus, ProbeStats};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tether_connect::{ProbeTarget, Reconnectable};
use tether_core_resilience::clock::Clock;
use tether_core_resilience::error::FailureError;
use tether_core_resilience::metrics::{MetricsSink, ProbeStatus};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Periodic prober for one terminal link
pub struct HealthMonitor {
    target: Arc<dyn ProbeTarget>,
    reconnector: Arc<dyn Reconnectable>,
    policy: HealthPolicy,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    snapshot: RwLock<Arc<HealthStatus>>,
    stats: Mutex<ProbeStats>,
    /// Set while a triggered reconnect is still running, so repeated
    /// unhealthy ticks do not pile up reconnect attempts
    reconnect_in_flight: Arc<AtomicBool>,
}

impl HealthMonitor {
    pub fn new(
        target: Arc<dyn ProbeTarget>,
        reconnector: Arc<dyn Reconnectable>,
        policy: HealthPolicy,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, FailureError> {
        policy.validate().map_err(FailureError::validation)?;
        Ok(Self {
            target,
            reconnector,
            policy,
            clock,
            metrics,
            snapshot: RwLock::new(Arc::new(HealthStatus::startup())),
            stats: Mutex::new(ProbeStats::default()),
            reconnect_in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Last known snapshot — never blocks on an in-flight probe
    pub fn health(&self) -> Arc<HealthStatus> {
        self.snapshot.read().unwrap().clone()
    }

    /// Lifetime probe counters
    pub fn stats(&self) -> ProbeStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Run one probe cycle and publish the resulting snapshot.
    ///
    /// Never fails: any internal error is reported as an unhealthy
    /// snapshot with the cause captured, so the periodic scheduler can
    /// never be crashed by a probing error.
    pub async fn probe(&self) -> Arc<HealthStatus> {
        let status = match self.probe_cycle().await {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "probe failed internally");
                HealthStatus {
                    connected: false,
                    authenticated: false,
                    data_feed_fresh: false,
                    latency_ms: 0.0,
                    last_probe_time: Some(Utc::now()),
                    overall: ProbeStatus::Unhealthy,
                    detail: Some(err.to_string()),
                }
            }
        };

        let status = Arc::new(status);
        {
            let mut snapshot = self.snapshot.write().unwrap();
            *snapshot = status.clone();
        }
        self.stats.lock().unwrap().record(status.overall);
        self.metrics.record_probe(status.latency_ms, status.overall);

        match status.overall {
            ProbeStatus::Unhealthy => self.trigger_reconnect(&status),
            ProbeStatus::Degraded => {
                debug!(latency_ms = status.latency_ms, feed_fresh = status.data_feed_fresh, "link degraded")
            }
            ProbeStatus::Healthy => {
                debug!(latency_ms = status.latency_ms, "link healthy")
            }
        }

        status
    }

    async fn probe_cycle(&self) -> Result<HealthStatus, FailureError> {
        if !self.target.is_connected() {
            return Ok(HealthStatus {
                connected: false,
                authenticated: false,
                data_feed_fresh: false,
                latency_ms: 0.0,
                last_probe_time: Some(Utc::now()),
                overall: ProbeStatus::Unhealthy,
                detail: Some("session is not connected".to_string()),
            });
        }

        let started = self.clock.now();
        let liveness = self.target.ping().await;
        let latency = self.clock.now().saturating_duration_since(started);
        let latency_ms = latency.as_secs_f64() * 1000.0;

        if let Err(err) = liveness {
            return Ok(HealthStatus {
                connected: false,
                authenticated: false,
                data_feed_fresh: false,
                latency_ms,
                last_probe_time: Some(Utc::now()),
                overall: ProbeStatus::Unhealthy,
                detail: Some(format!("liveness check failed: {err}")),
            });
        }

        let authenticated = self.target.check_auth().await?;
        let feed_age = self.target.feed_age().await?;
        let data_feed_fresh =
            matches!(feed_age, Some(age) if age <= self.policy.staleness_threshold());

        let overall = HealthStatus::aggregate(
            true,
            authenticated,
            data_feed_fresh,
            latency,
            self.policy.latency_warn(),
        );

        Ok(HealthStatus {
            connected: true,
            authenticated,
            data_feed_fresh,
            latency_ms,
            last_probe_time: Some(Utc::now()),
            overall,
            detail: None,
        })
    }

    /// Hand an unhealthy link to the session layer, at most one reconnect
    /// in flight at a time
    fn trigger_reconnect(&self, status: &HealthStatus) {
        if self
            .reconnect_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("reconnect already in flight, skipping trigger");
            return;
        }

        warn!(detail = ?status.detail, "link unhealthy, triggering reconnect");
        self.stats.lock().unwrap().reconnects_triggered += 1;

        let reconnector = self.reconnector.clone();
        let in_flight = self.reconnect_in_flight.clone();
        tokio::spawn(async move {
            match reconnector.reconnect().await {
                Ok(()) => info!("supervised reconnect succeeded"),
                Err(err) => warn!(error = %err, "supervised reconnect failed"),
            }
            in_flight.store(false, Ordering::Release);
        });
    }

    /// Probe on the policy interval until `shutdown` flips to true.
    ///
    /// No lock is held across the cancellation point, so shutdown is
    /// always clean.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_s = self.policy.probe_interval_s,
            "health monitor active"
        );

        loop {
            tokio::select! {
                _ = self.clock.sleep(self.policy.probe_interval()) => {
                    self.probe().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("health monitor stopped");
    }
}
