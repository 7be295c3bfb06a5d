//! The probe contract.

use async_trait::async_trait;
use std::time::Duration;

use crate::health::result::{HealthResult, HealthStatus};
use crate::resilience::CancellationToken;

/// Per-invocation context supplied by the caller.
#[derive(Debug, Clone)]
pub struct HealthCheckContext {
    /// Registration name, used for logs and metrics.
    pub name: String,
    /// Status to report when the check fails.
    pub failure_status: HealthStatus,
    /// Upper bound on the whole invocation.
    pub timeout: Option<Duration>,
}

impl HealthCheckContext {
    pub fn new(name: impl Into<String>, failure_status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            failure_status,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A unit that probes one external dependency.
///
/// Implementations must not fail: every fault, including cancellation, is
/// reported through the returned [`HealthResult`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Short identifier of the dependency kind, e.g. `"smtp"`.
    fn kind(&self) -> &'static str;

    async fn check_health(
        &self,
        ctx: &HealthCheckContext,
        cancel: &CancellationToken,
    ) -> HealthResult;
}
