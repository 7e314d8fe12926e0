//! Opaque transport seam to the trading terminal
//!
//! The terminal's native protocol stays entirely behind this trait; the
//! session layer only ever sees the connection handle type `C`. Production
//! code implements this over the terminal's bridge API, tests script it.

use crate::credentials::TerminalCredentials;
use async_trait::async_trait;
use std::time::Instant;
use tether_core_resilience::error::FailureError;

/// Dial-and-speak interface for one terminal endpoint
#[async_trait]
pub trait TerminalTransport<C: Send + 'static>: Send + Sync {
    /// Establish a fresh connection and complete the login handshake.
    ///
    /// Failures must be classified: `Connection` for transport errors,
    /// `Auth` for rejected credentials, `Data` for protocol violations.
    async fn connect(&self, credentials: &TerminalCredentials) -> Result<C, FailureError>;

    /// Lightweight liveness round-trip on an established connection
    async fn ping(&self, conn: &C) -> Result<(), FailureError>;

    /// Check that the login behind `conn` is still valid
    async fn check_auth(&self, conn: &C) -> Result<bool, FailureError>;

    /// Instant of the most recent market-data update seen on `conn`,
    /// `None` if no update has arrived yet
    async fn last_market_update(&self, conn: &C) -> Result<Option<Instant>, FailureError>;

    /// Tear down a connection (best effort)
    async fn disconnect(&self, conn: C) {
        drop(conn);
    }
}
