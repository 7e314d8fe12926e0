//! SessionManager: connection lifecycle and supervised reconnects
//!
//! One manager owns one session per terminal endpoint. Callers `acquire()`
//! the session, use it, and `release()` it; the physical connection stays
//! alive for reuse rather than being torn down per call.
//!
//! Every physical attempt is gated through the circuit breaker, carries an
//! explicit deadline, and reports its outcome back to the breaker.
//! Concurrent callers during an in-flight connect suspend on one mutex and
//! share the single outcome — exactly one physical attempt regardless of
//! caller count.

use crate::credentials::CredentialsProvider;
use crate::session::{Session, SessionState};
use crate::transport::TerminalTransport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tether_core_resilience::backoff::{BackoffPolicy, BackoffSchedule};
use tether_core_resilience::circuit_breaker::CircuitBreaker;
use tether_core_resilience::clock::{with_deadline, Clock};
use tether_core_resilience::error::{FailureError, FailureKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tunables for session management, always supplied externally
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline applied to every remote operation (connect, ping, auth check)
    pub operation_timeout: Duration,

    /// Backoff between reconnect attempts
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Narrow reconnect capability
///
/// The health prober holds this instead of the full [`SessionManager`], so
/// the only thing it can do to the session layer is ask for a reconnect.
#[async_trait]
pub trait Reconnectable: Send + Sync {
    async fn reconnect(&self) -> Result<(), FailureError>;
}

/// Read-only probe surface over the live session
///
/// Probe outcomes deliberately do not feed the circuit breaker: probing
/// noise must not be conflated with real call-failure accounting.
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    /// Lock-free status read
    fn is_connected(&self) -> bool;

    /// Liveness round-trip on the current connection
    async fn ping(&self) -> Result<(), FailureError>;

    /// Whether the terminal still accepts the session's login
    async fn check_auth(&self) -> Result<bool, FailureError>;

    /// Age of the most recent market-data update, `None` if no update
    /// has arrived yet
    async fn feed_age(&self) -> Result<Option<Duration>, FailureError>;
}

/// Owns the physical connection to one terminal endpoint
pub struct SessionManager<C: Send + 'static> {
    transport: Arc<dyn TerminalTransport<C>>,
    credentials: Arc<dyn CredentialsProvider>,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    session: Arc<Session<C>>,
    /// Single-flight gate: at most one physical connect at a time;
    /// concurrent callers suspend here and share the outcome
    connect_gate: Mutex<()>,
}

impl<C: Send + 'static> SessionManager<C> {
    pub fn new(
        transport: Arc<dyn TerminalTransport<C>>,
        credentials: Arc<dyn CredentialsProvider>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let id = format!("sess-{}", &Uuid::new_v4().simple().to_string()[..8]);
        Self {
            transport,
            credentials,
            breaker,
            clock,
            config,
            session: Arc::new(Session::new(id)),
            connect_gate: Mutex::new(()),
        }
    }

    /// Id of the session this manager owns
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    /// Lock-free state read
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The breaker gating this manager's terminal calls
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }

    /// Get a usable session, connecting if necessary.
    ///
    /// Idempotent when already connected: the existing session is returned
    /// without a new physical attempt. Fails with `Connection`, `Auth`,
    /// or `CircuitOpen`.
    pub async fn acquire(&self) -> Result<Arc<Session<C>>, FailureError> {
        match self.session.state() {
            SessionState::Connected => {
                self.session.touch(self.clock.now());
                return Ok(self.session.clone());
            }
            SessionState::Closed => {
                return Err(FailureError::state("session is closed")
                    .with_operation("acquire")
                    .with_session(self.session.id().to_owned()));
            }
            _ => {}
        }

        let _gate = self.connect_gate.lock().await;

        // Another caller may have finished the connect while we waited.
        match self.session.state() {
            SessionState::Connected => return Ok(self.session.clone()),
            SessionState::Closed => {
                return Err(FailureError::state("session is closed")
                    .with_operation("acquire")
                    .with_session(self.session.id().to_owned()));
            }
            _ => {}
        }

        self.establish(SessionState::Connecting).await?;
        Ok(self.session.clone())
    }

    /// Return the session after use.
    ///
    /// The connection is kept alive for reuse; only the activity timestamp
    /// is refreshed.
    pub async fn release(&self, session: &Session<C>) {
        session.touch(self.clock.now());
        debug!(session = %session.id(), "session released");
    }

    /// Tear the session down permanently
    pub async fn close(&self) -> Result<(), FailureError> {
        let _gate = self.connect_gate.lock().await;

        if self.session.state() == SessionState::Closed {
            return Ok(());
        }

        let old = self.session.conn.lock().await.take();
        self.session.transition(SessionState::Closed)?;
        if let Some(conn) = old {
            self.transport.disconnect(conn).await;
        }
        info!(session = %self.session.id(), "session closed");
        Ok(())
    }

    /// One breaker-gated, deadline-bounded physical attempt
    async fn connect_once(&self) -> Result<C, FailureError> {
        self.breaker.try_acquire().map_err(|err| {
            err.with_operation("connect")
                .with_session(self.session.id().to_owned())
        })?;

        let credentials = self.credentials.credentials().await?;
        let attempt = self.transport.connect(&credentials);

        match with_deadline(self.clock.as_ref(), self.config.operation_timeout, attempt).await {
            None => {
                self.breaker.record_failure();
                Err(FailureError::timeout(format!(
                    "connect exceeded {:?}",
                    self.config.operation_timeout
                ))
                .with_operation("connect")
                .with_session(self.session.id().to_owned()))
            }
            Some(Ok(conn)) => {
                self.breaker.record_success();
                Ok(conn)
            }
            Some(Err(err)) => {
                if err.should_trip_breaker() {
                    self.breaker.record_failure();
                }
                Err(err
                    .with_operation("connect")
                    .with_session(self.session.id().to_owned()))
            }
        }
    }

    /// Connect with retries, entering via `Connecting` or `Reconnecting`.
    ///
    /// Caller must hold the connect gate. `Connection`/`Timeout` failures
    /// are retried on the backoff schedule; `Auth` surfaces immediately and
    /// is never retried; `CircuitOpen` surfaces immediately so the caller
    /// backs off for the breaker's recovery timeout.
    async fn establish(&self, via: SessionState) -> Result<(), FailureError> {
        self.session.transition(via)?;
        let mut schedule = BackoffSchedule::new(self.config.backoff.clone());

        loop {
            match self.connect_once().await {
                Ok(conn) => {
                    let old = self.session.conn.lock().await.replace(conn);
                    if let Some(old) = old {
                        self.transport.disconnect(old).await;
                    }
                    self.session.transition(SessionState::Connected)?;
                    self.session.touch(self.clock.now());
                    info!(session = %self.session.id(), "terminal session established");
                    return Ok(());
                }
                Err(err) if err.kind() == FailureKind::Auth => {
                    // Retrying rejected credentials only amplifies lockout
                    // risk; surface immediately.
                    self.session.transition(SessionState::Disconnected)?;
                    warn!(session = %self.session.id(), error = %err, "credentials rejected, not retrying");
                    return Err(err);
                }
                Err(err) if err.kind() == FailureKind::CircuitOpen => {
                    self.session.transition(SessionState::Disconnected)?;
                    debug!(session = %self.session.id(), "circuit open, connect rejected");
                    return Err(err);
                }
                Err(err) => match schedule.next_delay() {
                    Some(delay) => {
                        warn!(
                            session = %self.session.id(),
                            attempt = schedule.attempt(),
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "connect attempt failed, backing off"
                        );
                        self.clock.sleep(delay).await;
                    }
                    None => {
                        self.session.transition(SessionState::Disconnected)?;
                        warn!(session = %self.session.id(), error = %err, "retry budget exhausted");
                        return Err(err);
                    }
                },
            }
        }
    }
}

#[async_trait]
impl<C: Send + 'static> Reconnectable for SessionManager<C> {
    /// Drop the current connection (if any) and dial again through the
    /// breaker-gated backoff path.
    async fn reconnect(&self) -> Result<(), FailureError> {
        let _gate = self.connect_gate.lock().await;

        let via = match self.session.state() {
            SessionState::Closed => {
                return Err(FailureError::state("session is closed")
                    .with_operation("reconnect")
                    .with_session(self.session.id().to_owned()));
            }
            SessionState::Connected => {
                let old = self.session.conn.lock().await.take();
                if let Some(conn) = old {
                    self.transport.disconnect(conn).await;
                }
                SessionState::Reconnecting
            }
            _ => SessionState::Connecting,
        };

        self.establish(via).await
    }
}

#[async_trait]
impl<C: Send + 'static> ProbeTarget for SessionManager<C> {
    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    async fn ping(&self) -> Result<(), FailureError> {
        // The guard is dropped on every exit path, including cancellation
        // of the probe task.
        let guard = self.session.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| {
            FailureError::state("no live connection")
                .with_operation("ping")
                .with_session(self.session.id().to_owned())
        })?;

        match with_deadline(
            self.clock.as_ref(),
            self.config.operation_timeout,
            self.transport.ping(conn),
        )
        .await
        {
            None => Err(FailureError::timeout("ping exceeded deadline")
                .with_operation("ping")
                .with_session(self.session.id().to_owned())),
            Some(result) => result,
        }
    }

    async fn check_auth(&self) -> Result<bool, FailureError> {
        let guard = self.session.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| {
            FailureError::state("no live connection")
                .with_operation("check_auth")
                .with_session(self.session.id().to_owned())
        })?;

        match with_deadline(
            self.clock.as_ref(),
            self.config.operation_timeout,
            self.transport.check_auth(conn),
        )
        .await
        {
            None => Err(FailureError::timeout("auth check exceeded deadline")
                .with_operation("check_auth")
                .with_session(self.session.id().to_owned())),
            Some(result) => result,
        }
    }

    async fn feed_age(&self) -> Result<Option<Duration>, FailureError> {
        let guard = self.session.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| {
            FailureError::state("no live connection")
                .with_operation("feed_age")
                .with_session(self.session.id().to_owned())
        })?;

        let last = match with_deadline(
            self.clock.as_ref(),
            self.config.operation_timeout,
            self.transport.last_market_update(conn),
        )
        .await
        {
            None => {
                return Err(FailureError::timeout("feed age check exceeded deadline")
                    .with_operation("feed_age")
                    .with_session(self.session.id().to_owned()))
            }
            Some(result) => result?,
        };
        Ok(last.map(|at| self.clock.now().saturating_duration_since(at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;
    use tether_core_resilience::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use tether_core_resilience::clock::SimulatedClock;
    use tether_core_resilience::metrics::NoopMetrics;
    use tokio::sync::Semaphore;

    #[derive(Debug)]
    struct MockConn {
        #[allow(dead_code)]
        id: usize,
    }

    enum Script {
        Ok,
        ConnErr,
        AuthErr,
        Hang,
    }

    struct MockTransport {
        attempts: AtomicUsize,
        script: StdMutex<VecDeque<Script>>,
        /// When set, connect blocks until a permit is added
        gate: Option<Arc<Semaphore>>,
        next_id: AtomicUsize,
    }

    impl MockTransport {
        fn scripted(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                script: StdMutex::new(script.into()),
                gate: None,
                next_id: AtomicUsize::new(0),
            })
        }

        fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                script: StdMutex::new(VecDeque::new()),
                gate: Some(gate),
                next_id: AtomicUsize::new(0),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TerminalTransport<MockConn> for MockTransport {
        async fn connect(
            &self,
            _credentials: &crate::credentials::TerminalCredentials,
        ) -> Result<MockConn, FailureError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let step = self.script.lock().unwrap().pop_front();
            match step {
                None | Some(Script::Ok) => Ok(MockConn {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                }),
                Some(Script::ConnErr) => Err(FailureError::connection("connection refused")),
                Some(Script::AuthErr) => Err(FailureError::auth("invalid account or password")),
                Some(Script::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn ping(&self, _conn: &MockConn) -> Result<(), FailureError> {
            Ok(())
        }

        async fn check_auth(&self, _conn: &MockConn) -> Result<bool, FailureError> {
            Ok(true)
        }

        async fn last_market_update(
            &self,
            _conn: &MockConn,
        ) -> Result<Option<Instant>, FailureError> {
            Ok(None)
        }
    }

    fn manager_with(
        transport: Arc<MockTransport>,
        clock: Arc<SimulatedClock>,
        backoff: BackoffPolicy,
    ) -> Arc<SessionManager<MockConn>> {
        let breaker = Arc::new(CircuitBreaker::new(
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(30),
                half_open_max_trials: 1,
                success_to_close: 1,
                window: Duration::from_secs(60),
            },
            clock.clone(),
            Arc::new(NoopMetrics),
        ));
        let credentials = Arc::new(StaticCredentials::new("100042", "pw", "demo"));
        Arc::new(SessionManager::new(
            transport,
            credentials,
            breaker,
            clock,
            SessionConfig {
                operation_timeout: Duration::from_secs(5),
                backoff,
            },
        ))
    }

    fn no_retry() -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: 1,
        }
    }

    fn instant_retries(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent_when_connected() {
        let transport = MockTransport::scripted(vec![Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_share_one_connect() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = MockTransport::gated(gate.clone());
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        let a = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await }
        });
        let b = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await }
        });

        // Let both callers reach the in-flight connect.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.attempts(), 1);

        gate.add_permits(1);
        let session_a = a.await.unwrap().unwrap();
        let session_b = b.await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&session_a, &session_b));
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let transport = MockTransport::scripted(vec![Script::AuthErr, Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, instant_retries(5));

        let err = manager.acquire().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Auth);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(manager.state(), SessionState::Disconnected);
        // Rejected credentials are not availability failures.
        assert_eq!(manager.breaker().failure_count(), 0);
        assert_eq!(manager.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let transport = MockTransport::scripted(vec![Script::ConnErr, Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, instant_retries(3));

        let session = manager.acquire().await.unwrap();

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(transport.attempts(), 2);
        assert_eq!(manager.breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_surfaces_connection_error() {
        let transport = MockTransport::scripted(vec![Script::ConnErr, Script::ConnErr]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, instant_retries(2));

        let err = manager.acquire().await.unwrap_err();

        assert_eq!(err.kind(), FailureKind::Connection);
        assert_eq!(transport.attempts(), 2);
        assert_eq!(manager.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_open_breaker_blocks_transport_entirely() {
        let transport = MockTransport::scripted(vec![]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        let breaker = manager.breaker();
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = manager.acquire().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::CircuitOpen);
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_timeout_counts_as_breaker_failure() {
        let transport = MockTransport::scripted(vec![Script::Hang]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock.clone(), no_retry());

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await }
        });

        // Let the connect reach its await, then expire the deadline.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        clock.advance(Duration::from_secs(5));

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(manager.breaker().failure_count(), 1);
        assert_eq!(manager.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_live_connection() {
        let transport = MockTransport::scripted(vec![Script::Ok, Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        manager.acquire().await.unwrap();
        manager.reconnect().await.unwrap();

        assert_eq!(transport.attempts(), 2);
        assert_eq!(manager.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_reconnect_before_first_connect() {
        let transport = MockTransport::scripted(vec![Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        manager.reconnect().await.unwrap();
        assert_eq!(manager.state(), SessionState::Connected);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let transport = MockTransport::scripted(vec![Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport.clone(), clock, no_retry());

        manager.acquire().await.unwrap();
        manager.close().await.unwrap();
        assert_eq!(manager.state(), SessionState::Closed);

        let err = manager.acquire().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::State);

        let err = manager.reconnect().await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::State);

        // Closing twice is fine.
        manager.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_probe_surface_without_connection() {
        let transport = MockTransport::scripted(vec![]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport, clock, no_retry());

        assert!(!ProbeTarget::is_connected(manager.as_ref()));
        let err = ProbeTarget::ping(manager.as_ref()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::State);
    }

    #[tokio::test]
    async fn test_release_refreshes_activity() {
        let transport = MockTransport::scripted(vec![Script::Ok]);
        let clock = Arc::new(SimulatedClock::new());
        let manager = manager_with(transport, clock.clone(), no_retry());

        let session = manager.acquire().await.unwrap();
        let connected_at = session.last_activity().unwrap();

        clock.advance(Duration::from_secs(3));
        manager.release(&session).await;

        let released_at = session.last_activity().unwrap();
        assert_eq!(released_at.duration_since(connected_at), Duration::from_secs(3));
    }
}
