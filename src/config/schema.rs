//! Configuration schema definitions.
//!
//! This module defines the probe file layout. Check options themselves live
//! next to their checks and are flattened into each check entry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::checks::elasticsearch::ElasticsearchOptions;
use crate::checks::smtp::SmtpOptions;
use crate::health::HealthStatus;

/// Root configuration for a set of health probes.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Values applied to checks that do not override them.
    pub defaults: DefaultsConfig,

    /// Search-cluster checks.
    pub elasticsearch: Vec<ElasticsearchCheckConfig>,

    /// Mail-relay checks.
    pub smtp: Vec<SmtpCheckConfig>,
}

impl ProbeConfig {
    /// Names of every configured check, in file order.
    pub fn check_names(&self) -> impl Iterator<Item = &str> {
        self.elasticsearch
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.smtp.iter().map(|c| c.name.as_str()))
    }
}

/// Defaults shared by all checks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Upper bound on one check invocation, in seconds.
    pub timeout_secs: u64,

    /// Status reported when a check fails.
    pub failure_status: HealthStatus,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            failure_status: HealthStatus::Unhealthy,
        }
    }
}

/// Fields every check entry carries besides its options.
pub trait CheckEntry {
    fn name(&self) -> &str;
    fn failure_status_override(&self) -> Option<HealthStatus>;
    fn timeout_secs_override(&self) -> Option<u64>;

    /// Effective failure status.
    fn failure_status(&self, defaults: &DefaultsConfig) -> HealthStatus {
        self.failure_status_override()
            .unwrap_or(defaults.failure_status)
    }

    /// Effective invocation timeout. Zero disables the bound.
    fn timeout(&self, defaults: &DefaultsConfig) -> Option<Duration> {
        match self.timeout_secs_override().unwrap_or(defaults.timeout_secs) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// A configured search-cluster check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElasticsearchCheckConfig {
    /// Registration name, unique across the file.
    pub name: String,

    #[serde(default)]
    pub failure_status: Option<HealthStatus>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(flatten)]
    pub options: ElasticsearchOptions,
}

/// A configured mail-relay check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpCheckConfig {
    /// Registration name, unique across the file.
    pub name: String,

    #[serde(default)]
    pub failure_status: Option<HealthStatus>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(flatten)]
    pub options: SmtpOptions,
}

impl CheckEntry for ElasticsearchCheckConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn failure_status_override(&self) -> Option<HealthStatus> {
        self.failure_status
    }

    fn timeout_secs_override(&self) -> Option<u64> {
        self.timeout_secs
    }
}

impl CheckEntry for SmtpCheckConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn failure_status_override(&self) -> Option<HealthStatus> {
        self.failure_status
    }

    fn timeout_secs_override(&self) -> Option<u64> {
        self.timeout_secs
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Record metrics and write them out after the run.
    pub metrics_enabled: bool,

    /// Prometheus text file written after every run, for a textfile collector.
    pub metrics_path: PathBuf,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_path: PathBuf::from("health-probe.prom"),
        }
    }
}
