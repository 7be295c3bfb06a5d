//! Normalized health verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::health::check::HealthCheckContext;
use crate::health::error::CheckError;

/// Health status reported to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check invocation.
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub status: HealthStatus,
    pub description: Option<String>,
    /// The fault that caused a non-healthy status, kept for diagnostics.
    pub fault: Option<Arc<CheckError>>,
}

impl HealthResult {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            description: None,
            fault: None,
        }
    }

    pub fn with_status(status: HealthStatus, description: Option<String>) -> Self {
        Self {
            status,
            description,
            fault: None,
        }
    }

    /// Map a probe outcome onto the registration's severity.
    ///
    /// Failures take the context's failure status, the fault's message as
    /// description, and the fault itself.
    pub fn from_outcome(ctx: &HealthCheckContext, outcome: Result<(), CheckError>) -> Self {
        match outcome {
            Ok(()) => Self::healthy(),
            Err(fault) => Self {
                status: ctx.failure_status,
                description: Some(fault.to_string()),
                fault: Some(Arc::new(fault)),
            },
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Serializable view of a result, used for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReportEntry<'a> {
    pub name: &'a str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl<'a> HealthReportEntry<'a> {
    pub fn new(name: &'a str, result: &'a HealthResult) -> Self {
        Self {
            name,
            status: result.status,
            description: result.description.as_deref(),
            fault: result.fault.as_ref().map(|f| format!("{:?}", f)),
        }
    }
}
