//! Credential supply for terminal logins
//!
//! Secrets are wrapped in [`secrecy::SecretString`] (zeroized on drop) and
//! every `Debug` path is redacted. Credentials are fetched from the provider
//! once per physical connection attempt, so rotated secrets are picked up
//! without a restart.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tether_core_resilience::error::FailureError;

/// Login material for the terminal
pub struct TerminalCredentials {
    /// Account identifier at the terminal
    pub account: String,

    /// Account password; never logged, never serialized
    pub password: SecretString,

    /// Terminal server to log in against
    pub server: String,
}

impl fmt::Debug for TerminalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalCredentials")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Opaque secret supplier consumed by the session layer
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Produce login material for one connection attempt
    async fn credentials(&self) -> Result<TerminalCredentials, FailureError>;
}

/// Fixed credentials handed over at construction (development and tests)
pub struct StaticCredentials {
    account: String,
    password: SecretString,
    server: String,
}

impl StaticCredentials {
    pub fn new(
        account: impl Into<String>,
        password: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            password: SecretString::from(password.into()),
            server: server.into(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentials {
    async fn credentials(&self) -> Result<TerminalCredentials, FailureError> {
        Ok(TerminalCredentials {
            account: self.account.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
            server: self.server.clone(),
        })
    }
}

/// Reads the password from an environment variable at call time
pub struct EnvCredentials {
    account: String,
    password_var: String,
    server: String,
}

impl EnvCredentials {
    pub fn new(
        account: impl Into<String>,
        password_var: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            password_var: password_var.into(),
            server: server.into(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for EnvCredentials {
    async fn credentials(&self) -> Result<TerminalCredentials, FailureError> {
        let password = std::env::var(&self.password_var).map_err(|_| {
            FailureError::validation(format!(
                "credential variable {} is not set",
                self.password_var
            ))
        })?;
        Ok(TerminalCredentials {
            account: self.account.clone(),
            password: SecretString::from(password),
            server: self.server.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_returns_material() {
        let provider = StaticCredentials::new("100042", "hunter2", "demo.terminal.example");
        let creds = provider.credentials().await.unwrap();

        assert_eq!(creds.account, "100042");
        assert_eq!(creds.server, "demo.terminal.example");
        assert_eq!(creds.password.expose_secret(), "hunter2");
    }

    #[tokio::test]
    async fn test_debug_redacts_password() {
        let provider = StaticCredentials::new("100042", "hunter2", "demo.terminal.example");
        let creds = provider.credentials().await.unwrap();

        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_env_provider_missing_var() {
        let provider = EnvCredentials::new("1", "TETHER_TEST_UNSET_VAR", "srv");
        let err = provider.credentials().await.unwrap_err();
        assert_eq!(
            err.kind(),
            tether_core_resilience::error::FailureKind::Validation
        );
    }
}
