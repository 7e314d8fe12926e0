//! Session: the live, reusable link to the terminal
//!
//! The lifecycle state lives in an `AtomicU8` so status reads are lock-free;
//! the connection handle itself sits behind one async mutex that guards all
//! mutation. Transitions are validated against the lifecycle graph; an
//! illegal transition is a `State` failure, never silent corruption.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Instant;
use tether_core_resilience::error::FailureError;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle state of a session
///
/// Legal transitions:
///
/// ```text
/// Disconnected ──> Connecting ──> Connected ──> Reconnecting ──> Connected
///       │               │             │               │
///       └───────────────┴──> Closed <─┴───────────────┘
/// ```
///
/// There is no direct `Disconnected -> Connected` edge; every connection
/// goes through `Connecting`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Closed = 4,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionState::Disconnected,
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Reconnecting,
            _ => SessionState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }

    /// Whether the lifecycle graph permits `self -> to`
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Disconnected, Closed)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connecting, Closed)
                | (Connected, Reconnecting)
                | (Connected, Closed)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
                | (Reconnecting, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live terminal session
///
/// The connection handle is exclusively owned here; callers interact with
/// it only through the session manager.
#[derive(Debug)]
pub struct Session<C> {
    id: String,
    state: AtomicU8,
    last_activity: StdMutex<Option<Instant>>,
    pub(crate) conn: Mutex<Option<C>>,
}

impl<C> Session<C> {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            state: AtomicU8::new(SessionState::Disconnected as u8),
            last_activity: StdMutex::new(None),
            conn: Mutex::new(None),
        }
    }

    /// Session id used in logs and error context
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state — lock-free atomic read
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the session currently holds a live connection
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Instant of the last successful use of the session
    pub fn last_activity(&self) -> Option<Instant> {
        *self.last_activity.lock().unwrap()
    }

    pub(crate) fn touch(&self, now: Instant) {
        *self.last_activity.lock().unwrap() = Some(now);
    }

    /// Move the session to `to`, enforcing the lifecycle graph.
    ///
    /// Transitioning to the current state is a no-op.
    pub(crate) fn transition(&self, to: SessionState) -> Result<(), FailureError> {
        let mut current = self.state();
        loop {
            if current == to {
                return Ok(());
            }
            if !current.can_transition(to) {
                return Err(FailureError::state(format!(
                    "illegal session transition {current} -> {to}"
                ))
                .with_session(self.id.clone()));
            }
            match self.state.compare_exchange(
                current as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(session = %self.id, from = %current, to = %to, "session state");
                    return Ok(());
                }
                Err(raw) => current = SessionState::from_u8(raw),
            }
        }
    }
}
