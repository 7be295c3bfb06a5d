//! Named failure paths of the bundled checks.

use std::fmt;
use thiserror::Error;

use crate::checks::elasticsearch::SearchError;
use crate::checks::smtp::{SmtpError, SmtpSecurity};
use crate::resilience::Interrupt;

/// Step of a probe that was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    Connect,
    Authenticate,
    Ping,
}

impl fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ProbeStage::Connect => "connect",
            ProbeStage::Authenticate => "authenticate",
            ProbeStage::Ping => "ping",
        };
        f.write_str(stage)
    }
}

/// Why a check reported a non-healthy status.
///
/// The `Display` output becomes the result description, so every variant
/// names the target it was talking to.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The search client could not be built from the configured options.
    #[error("Could not build search client for {target}: {source}")]
    ClientSetup {
        target: String,
        #[source]
        source: SearchError,
    },

    /// The ping request failed before a status was received.
    #[error("Ping to {target} failed: {source}")]
    Ping {
        target: String,
        #[source]
        source: SearchError,
    },

    /// The ping was answered with something other than 200.
    #[error("Ping to {target} returned status {status}")]
    UnexpectedStatus { target: String, status: u16 },

    /// The mail relay did not accept the connection.
    #[error("Could not connect to smtp server {host}:{port} - security mode: {mode}")]
    Connect {
        host: String,
        port: u16,
        mode: SmtpSecurity,
        #[source]
        source: SmtpError,
    },

    /// The mail relay rejected the configured credentials.
    #[error("Error login to smtp server {host}:{port} with configured credentials")]
    Authentication {
        host: String,
        port: u16,
        #[source]
        source: SmtpError,
    },

    /// A probe step was cancelled or ran out of time.
    #[error("{stage} against {target} {interrupt}")]
    Interrupted {
        target: String,
        stage: ProbeStage,
        #[source]
        interrupt: Interrupt,
    },
}

impl CheckError {
    /// Whether the failure came from cancellation or a deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CheckError::Interrupted { .. })
    }
}
