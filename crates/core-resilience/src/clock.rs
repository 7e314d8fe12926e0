//! Clock abstraction for backoff timing, deadlines and probe scheduling
//!
//! Every component that needs time takes a `Clock` instead of calling
//! `Instant::now()` or `tokio::time::sleep` directly, so tests can simulate
//! elapsed time deterministically instead of sleeping in real time.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Source of monotonic time and task suspension
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Suspend the calling task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer (the production implementation)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `fut` against a deadline measured on `clock`.
///
/// Returns `None` if the deadline elapses first. The in-flight future is
/// dropped at that point, cancelling the operation.
pub async fn with_deadline<T>(
    clock: &dyn Clock,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        out = fut => Some(out),
        _ = clock.sleep(limit) => None,
    }
}

/// Manually driven clock for deterministic tests
///
/// Time only moves when `advance` is called; pending sleeps whose deadline
/// has been reached are woken. A sleep of zero duration returns immediately.
///
/// # Example
///
/// ```
/// use tether_core_resilience::clock::{Clock, SimulatedClock};
/// use std::time::Duration;
///
/// let clock = SimulatedClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(30));
/// assert_eq!(clock.now() - before, Duration::from_secs(30));
/// ```
#[derive(Debug)]
pub struct SimulatedClock {
    base: Instant,
    offset: Mutex<Duration>,
    waker: Notify,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            waker: Notify::new(),
        }
    }

    /// Move the clock forward, waking any sleeper whose deadline passed
    pub fn advance(&self, by: Duration) {
        {
            let mut offset = self.offset.lock().unwrap();
            *offset += by;
        }
        self.waker.notify_waiters();
    }

    /// Total simulated time elapsed since construction
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        let deadline = *self.offset.lock().unwrap() + duration;
        loop {
            // Register for notification before checking, so an advance()
            // between the check and the await is never missed.
            let notified = self.waker.notified();
            if *self.offset.lock().unwrap() >= deadline {
                return;
            }
            notified.await;
        }
    }
}
