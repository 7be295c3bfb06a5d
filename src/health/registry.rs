//! Check registrations and the invocation wrapper.
//!
//! # Responsibilities
//! - Build one registration per configured check
//! - Invoke checks with a per-registration context
//! - Log and record every verdict

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::checks::elasticsearch::{ElasticsearchHealthCheck, SearchClient};
use crate::checks::smtp::SmtpHealthCheck;
use crate::config::schema::{CheckEntry, DefaultsConfig, ProbeConfig};
use crate::config::ConfigError;
use crate::health::check::{HealthCheck, HealthCheckContext};
use crate::health::result::{HealthResult, HealthStatus};
use crate::net::ConnectionCache;
use crate::observability::metrics;
use crate::resilience::CancellationToken;

/// A named check plus the severity and deadline it runs with.
#[derive(Clone)]
pub struct Registration {
    pub name: String,
    pub failure_status: HealthStatus,
    pub timeout: Option<Duration>,
    pub check: Arc<dyn HealthCheck>,
}

impl Registration {
    pub fn new(name: impl Into<String>, check: Arc<dyn HealthCheck>) -> Self {
        Self {
            name: name.into(),
            failure_status: HealthStatus::Unhealthy,
            timeout: None,
            check,
        }
    }

    pub fn context(&self) -> HealthCheckContext {
        HealthCheckContext::new(self.name.clone(), self.failure_status).with_timeout(self.timeout)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("kind", &self.check.kind())
            .field("failure_status", &self.failure_status)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Build every configured check, sharing search clients through `cache`.
pub fn build_registrations(
    config: &ProbeConfig,
    cache: &ConnectionCache<SearchClient>,
) -> Result<Vec<Registration>, ConfigError> {
    let mut registrations = Vec::new();

    for entry in &config.elasticsearch {
        let check = ElasticsearchHealthCheck::new(entry.options.clone(), cache.clone())?;
        registrations.push(register(entry, &config.defaults, Arc::new(check)));
    }

    for entry in &config.smtp {
        let check = SmtpHealthCheck::new(entry.options.clone())?;
        registrations.push(register(entry, &config.defaults, Arc::new(check)));
    }

    tracing::info!(count = registrations.len(), "Health checks registered");
    Ok(registrations)
}

fn register(
    entry: &impl CheckEntry,
    defaults: &DefaultsConfig,
    check: Arc<dyn HealthCheck>,
) -> Registration {
    Registration {
        name: entry.name().to_string(),
        failure_status: entry.failure_status(defaults),
        timeout: entry.timeout(defaults),
        check,
    }
}

/// Invoke one registration.
pub async fn run_check(registration: &Registration, cancel: &CancellationToken) -> HealthResult {
    let ctx = registration.context();
    let span = tracing::info_span!(
        "health_check",
        check = %registration.name,
        kind = registration.check.kind(),
        invocation_id = %Uuid::new_v4(),
    );

    async {
        let started = Instant::now();
        let result = registration.check.check_health(&ctx, cancel).await;
        let elapsed = started.elapsed();

        metrics::record_check(&registration.name, result.status, elapsed);
        tracing::info!(
            status = %result.status,
            elapsed_ms = elapsed.as_millis() as u64,
            description = result.description.as_deref().unwrap_or(""),
            "Health check completed"
        );
        result
    }
    .instrument(span)
    .await
}

/// Invoke every registration concurrently. Results keep registration order.
pub async fn run_all(
    registrations: &[Registration],
    cancel: &CancellationToken,
) -> Vec<(String, HealthResult)> {
    let results = join_all(registrations.iter().map(|r| run_check(r, cancel))).await;
    registrations
        .iter()
        .map(|r| r.name.clone())
        .zip(results)
        .collect()
}
