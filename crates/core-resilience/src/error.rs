//! Error taxonomy shared by every layer of the terminal link
//!
//! One discriminated error type with a `kind` field rather than a deep
//! exception hierarchy. Every failure carries a correlation bundle
//! (correlation id, attempted operation, session id, timestamp, underlying
//! cause) for structured logging. Secrets never enter messages or context.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Transport/socket failure while talking to the terminal
    Connection,

    /// Credentials rejected by the terminal
    Auth,

    /// The circuit breaker is open — synthetic signal, no remote call
    /// was attempted
    CircuitOpen,

    /// Operation exceeded its deadline
    Timeout,

    /// Malformed or unexpected response from the terminal
    Data,

    /// Caller-supplied parameters were invalid before any remote call
    Validation,

    /// Operation attempted on a session in an invalid lifecycle state
    State,
}

impl FailureKind {
    /// Whether this failure may be retried through the backoff policy
    pub fn retryable(&self) -> bool {
        matches!(self, FailureKind::Connection | FailureKind::Timeout)
    }

    /// Whether this failure should contribute to circuit breaker
    /// failure accounting
    pub fn should_trip_breaker(&self) -> bool {
        matches!(self, FailureKind::Connection | FailureKind::Timeout)
    }

    /// Stable string form, used in structured log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Auth => "auth",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::Timeout => "timeout",
            FailureKind::Data => "data",
            FailureKind::Validation => "validation",
            FailureKind::State => "state",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation bundle attached to every failure
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Unique id tying this failure to log lines across components
    pub correlation_id: Uuid,

    /// Operation that was being attempted (e.g. "connect", "ping")
    pub operation: Option<String>,

    /// Session the operation ran against, if any
    pub session_id: Option<String>,

    /// Wall-clock time the failure was created
    pub timestamp: DateTime<Utc>,

    /// Underlying cause, rendered to a string
    pub cause: Option<String>,
}

impl ErrorContext {
    fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            operation: None,
            session_id: None,
            timestamp: Utc::now(),
            cause: None,
        }
    }
}

/// A failure anywhere in the terminal link
///
/// Constructed through the per-kind constructors and enriched with the
/// builder methods:
///
/// ```
/// use tether_core_resilience::error::{FailureError, FailureKind};
///
/// let err = FailureError::connection("socket reset by peer")
///     .with_operation("connect")
///     .with_session("sess-1a2b3c4d");
///
/// assert_eq!(err.kind(), FailureKind::Connection);
/// assert!(err.retryable());
/// ```
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FailureError {
    kind: FailureKind,
    message: String,
    context: ErrorContext,
}

impl FailureError {
    /// Create a failure of the given kind
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Transport/socket failure
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    /// Credentials rejected
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }

    /// Synthetic fast-fail while the breaker is open
    pub fn circuit_open() -> Self {
        Self::new(
            FailureKind::CircuitOpen,
            "circuit breaker is open, rejecting calls",
        )
    }

    /// Deadline exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Malformed response from the terminal
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Data, message)
    }

    /// Invalid caller-supplied parameters
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message)
    }

    /// Invalid lifecycle state for the operation
    pub fn state(message: impl Into<String>) -> Self {
        Self::new(FailureKind::State, message)
    }

    /// Record the operation that was being attempted
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Record the session the operation ran against
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.context.session_id = Some(session_id.into());
        self
    }

    /// Record the underlying cause
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.context.cause = Some(cause.to_string());
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Whether this failure may be retried through the backoff policy
    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    /// Whether this failure should contribute to circuit breaker
    /// failure accounting
    pub fn should_trip_breaker(&self) -> bool {
        self.kind.should_trip_breaker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let conn = FailureError::connection("socket closed");
        assert!(conn.retryable());
        assert!(conn.should_trip_breaker());

        let timeout = FailureError::timeout("connect exceeded 5s");
        assert!(timeout.retryable());
        assert!(timeout.should_trip_breaker());

        let auth = FailureError::auth("login rejected");
        assert!(!auth.retryable());
        assert!(!auth.should_trip_breaker());

        let open = FailureError::circuit_open();
        assert!(!open.retryable());
        assert!(!open.should_trip_breaker());

        for err in [
            FailureError::data("unexpected frame"),
            FailureError::validation("volume must be positive"),
            FailureError::state("session is closed"),
        ] {
            assert!(!err.retryable());
            assert!(!err.should_trip_breaker());
        }
    }

    #[test]
    fn test_context_builder() {
        let err = FailureError::connection("reset")
            .with_operation("connect")
            .with_session("sess-42")
            .with_cause("os error 104");

        let ctx = err.context();
        assert_eq!(ctx.operation.as_deref(), Some("connect"));
        assert_eq!(ctx.session_id.as_deref(), Some("sess-42"));
        assert_eq!(ctx.cause.as_deref(), Some("os error 104"));
    }

    #[test]
    fn test_display_carries_kind_and_message() {
        let err = FailureError::timeout("ping exceeded 2s");
        let rendered = err.to_string();
        assert!(rendered.contains("timeout"));
        assert!(rendered.contains("ping exceeded 2s"));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = FailureError::connection("a");
        let b = FailureError::connection("b");
        assert_ne!(a.context().correlation_id, b.context().correlation_id);
    }
}
