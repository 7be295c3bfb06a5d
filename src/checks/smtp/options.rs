//! Mail-relay check options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::duration_serde;
use crate::config::validation::ValidationError;

/// Implicit-TLS submission port.
pub const SMTPS_PORT: u16 = 465;
/// STARTTLS submission port.
pub const SUBMISSION_PORT: u16 = 587;

/// Transport security for the relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// Chosen from the port: 465 implicit TLS, 587 STARTTLS, otherwise plain.
    #[default]
    Auto,
    Plain,
    ImplicitTls,
    StartTls,
}

impl SmtpSecurity {
    /// Resolve `Auto` against the configured port.
    pub fn resolve(self, port: u16) -> SmtpSecurity {
        match (self, port) {
            (SmtpSecurity::Auto, SMTPS_PORT) => SmtpSecurity::ImplicitTls,
            (SmtpSecurity::Auto, SUBMISSION_PORT) => SmtpSecurity::StartTls,
            (SmtpSecurity::Auto, _) => SmtpSecurity::Plain,
            (explicit, _) => explicit,
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            SmtpSecurity::Auto => "auto",
            SmtpSecurity::Plain => "plain",
            SmtpSecurity::ImplicitTls => "implicit_tls",
            SmtpSecurity::StartTls => "start_tls",
        };
        f.write_str(mode)
    }
}

/// Account used when login is enabled.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Options for a mail-relay check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    /// Login is attempted only when credentials are present.
    pub login: Option<SmtpCredentials>,
    pub allow_invalid_certificates: bool,
    /// Bound on TCP connect, TLS and the greeting exchange.
    #[serde(rename = "connect_timeout_secs", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 25,
            security: SmtpSecurity::Auto,
            login: None,
            allow_invalid_certificates: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl SmtpOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn login_with(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(SmtpCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn allow_invalid_certificates(mut self, allow: bool) -> Self {
        self.allow_invalid_certificates = allow;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Security mode after resolving `Auto`.
    pub fn effective_security(&self) -> SmtpSecurity {
        self.security.resolve(self.port)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(ValidationError::new("host", "must not be empty"));
        }
        if self.port == 0 {
            errors.push(ValidationError::new("port", "must not be zero"));
        }
        if self.connect_timeout.is_zero() {
            errors.push(ValidationError::new(
                "connect_timeout_secs",
                "must be greater than zero",
            ));
        }
        if let Some(login) = &self.login {
            if login.username.is_empty() {
                errors.push(ValidationError::new("login.username", "must not be empty"));
            }
        }

        errors
    }
}
