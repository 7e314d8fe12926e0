//! Tether Connect: session lifecycle for the terminal link
//!
//! Responsibilities:
//! - Own the physical connection to one terminal endpoint
//! - Gate every attempt through the circuit breaker and report outcomes back
//! - Collapse concurrent connect requests into a single physical attempt
//! - Expose narrow capabilities ([`Reconnectable`], [`ProbeTarget`]) so the
//!   health prober never holds the full manager
//!
//! The terminal's wire protocol stays behind [`TerminalTransport`]; this
//! crate never parses a byte of it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_connect::{SessionConfig, SessionManager, StaticCredentials};
//! use tether_core_resilience::prelude::*;
//!
//! # async fn example(transport: Arc<dyn tether_connect::TerminalTransport<()>>) -> Result<(), FailureError> {
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let breaker = Arc::new(CircuitBreaker::new(
//!     CircuitBreakerConfig::default(),
//!     clock.clone(),
//!     Arc::new(NoopMetrics),
//! ));
//! let credentials = Arc::new(StaticCredentials::new("100042", "pw", "demo.terminal"));
//!
//! let manager = SessionManager::new(transport, credentials, breaker, clock, SessionConfig::default());
//!
//! let session = manager.acquire().await?;
//! // ... submit orders over the session ...
//! manager.release(&session).await;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod manager;
pub mod session;
pub mod transport;

pub use credentials::{CredentialsProvider, EnvCredentials, StaticCredentials, TerminalCredentials};
pub use manager::{ProbeTarget, Reconnectable, SessionConfig, SessionManager};
pub use session::{Session, SessionState};
pub use transport::TerminalTransport;
