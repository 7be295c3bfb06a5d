//! Mail-relay health check.
//!
//! # Data Flow
//! ```text
//! check_health
//!     → connector opens a fresh session (connection.rs)
//!     → connect, raced against cancellation
//!     → authenticate when login is configured, raced against cancellation
//!     → close on every exit path
//! ```
//!
//! Sessions are stateful, so unlike search clients they are never cached.

pub mod connection;
pub mod options;

pub use connection::{
    MailConnection, MailConnector, SessionState, SmtpConnection, SmtpError, TcpMailConnector,
};
pub use options::{SmtpCredentials, SmtpOptions, SmtpSecurity};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::health::{CheckError, HealthCheck, HealthCheckContext, HealthResult, ProbeStage};
use crate::resilience::{with_cancellation, CancellationToken, Interrupt};

/// Probes a mail relay by connecting and, optionally, logging in.
pub struct SmtpHealthCheck {
    options: SmtpOptions,
    connector: Arc<dyn MailConnector>,
}

impl SmtpHealthCheck {
    /// Create a check that opens real TCP sessions.
    pub fn new(options: SmtpOptions) -> Result<Self, ConfigError> {
        Self::with_connector(options, Arc::new(TcpMailConnector))
    }

    /// Create a check with a custom session factory.
    pub fn with_connector(
        options: SmtpOptions,
        connector: Arc<dyn MailConnector>,
    ) -> Result<Self, ConfigError> {
        let errors = options.validate();
        if !errors.is_empty() {
            return Err(ConfigError::InvalidOptions {
                check: "smtp",
                errors,
            });
        }
        Ok(Self { options, connector })
    }

    pub fn options(&self) -> &SmtpOptions {
        &self.options
    }

    fn target(&self) -> String {
        format!("{}:{}", self.options.host, self.options.port)
    }

    async fn converse(
        &self,
        session: &mut dyn MailConnection,
        ctx: &HealthCheckContext,
        cancel: &CancellationToken,
    ) -> Result<(), CheckError> {
        let deadline = ctx.timeout.map(|t| Instant::now() + t);

        with_cancellation(session.connect(), cancel, remaining(deadline))
            .await
            .map_err(|interrupt| self.interrupted(ProbeStage::Connect, interrupt))?
            .map_err(|source| CheckError::Connect {
                host: self.options.host.clone(),
                port: self.options.port,
                mode: self.options.security,
                source,
            })?;

        if let Some(account) = &self.options.login {
            with_cancellation(
                session.authenticate(&account.username, &account.password),
                cancel,
                remaining(deadline),
            )
            .await
            .map_err(|interrupt| self.interrupted(ProbeStage::Authenticate, interrupt))?
            .map_err(|source| CheckError::Authentication {
                host: self.options.host.clone(),
                port: self.options.port,
                source,
            })?;
        }

        Ok(())
    }

    fn interrupted(&self, stage: ProbeStage, interrupt: Interrupt) -> CheckError {
        CheckError::Interrupted {
            target: format!("smtp server {}", self.target()),
            stage,
            interrupt,
        }
    }
}

fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

#[async_trait]
impl HealthCheck for SmtpHealthCheck {
    fn kind(&self) -> &'static str {
        "smtp"
    }

    async fn check_health(
        &self,
        ctx: &HealthCheckContext,
        cancel: &CancellationToken,
    ) -> HealthResult {
        let mut session = self.connector.open(&self.options);
        let outcome = self.converse(session.as_mut(), ctx, cancel).await;
        session.close().await;

        if let Err(e) = &outcome {
            tracing::warn!(
                check = %ctx.name,
                relay = %self.target(),
                error = %e,
                "Mail relay probe failed"
            );
        }
        HealthResult::from_outcome(ctx, outcome)
    }
}

impl std::fmt::Debug for SmtpHealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpHealthCheck")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
