//! Search-cluster health check.
//!
//! # Data Flow
//! ```text
//! check_health
//!     → options.rs (connection mode, auth, key material)
//!     → net::cache (reuse or build client.rs)
//!     → client.rs ping, raced against cancellation
//!     → 200 → Healthy, anything else → failure status
//! ```

pub mod client;
pub mod options;

pub use client::{SearchClient, SearchError};
pub use options::{CertificateValidation, ElasticsearchAuth, ElasticsearchOptions};

use async_trait::async_trait;
use crate::config::ConfigError;
use crate::health::{CheckError, HealthCheck, HealthCheckContext, HealthResult, ProbeStage};
use crate::net::{ConnectionCache, ConnectionKey};
use crate::resilience::{with_cancellation, CancellationToken};

/// Status a liveness ping must return to count as healthy.
const PING_SUCCESS: u16 = 200;

/// Probes a search cluster with a lightweight ping.
#[derive(Debug)]
pub struct ElasticsearchHealthCheck {
    options: ElasticsearchOptions,
    key: ConnectionKey,
    cache: ConnectionCache<SearchClient>,
}

impl ElasticsearchHealthCheck {
    /// Create a check sharing clients through `cache`.
    ///
    /// Options are validated here; a rejected configuration never reaches
    /// probe execution.
    pub fn new(
        options: ElasticsearchOptions,
        cache: ConnectionCache<SearchClient>,
    ) -> Result<Self, ConfigError> {
        let errors = options.validate();
        if !errors.is_empty() {
            return Err(ConfigError::InvalidOptions {
                check: "elasticsearch",
                errors,
            });
        }

        let key = ConnectionKey::derive(options.target(), &options);
        Ok(Self {
            options,
            key,
            cache,
        })
    }

    /// Identity this check's client is cached under.
    pub fn connection_key(&self) -> &ConnectionKey {
        &self.key
    }

    async fn probe(
        &self,
        ctx: &HealthCheckContext,
        cancel: &CancellationToken,
    ) -> Result<(), CheckError> {
        let target = self.key.target().to_string();

        let client = self
            .cache
            .get_or_create(&self.key, || SearchClient::from_options(&self.options))
            .map_err(|source| CheckError::ClientSetup {
                target: target.clone(),
                source,
            })?;

        let status = with_cancellation(client.ping(), cancel, ctx.timeout)
            .await
            .map_err(|interrupt| CheckError::Interrupted {
                target: target.clone(),
                stage: ProbeStage::Ping,
                interrupt,
            })?
            .map_err(|source| CheckError::Ping {
                target: target.clone(),
                source,
            })?;

        if status == PING_SUCCESS {
            Ok(())
        } else {
            Err(CheckError::UnexpectedStatus { target, status })
        }
    }
}

#[async_trait]
impl HealthCheck for ElasticsearchHealthCheck {
    fn kind(&self) -> &'static str {
        "elasticsearch"
    }

    async fn check_health(
        &self,
        ctx: &HealthCheckContext,
        cancel: &CancellationToken,
    ) -> HealthResult {
        let outcome = self.probe(ctx, cancel).await;
        if let Err(e) = &outcome {
            tracing::warn!(
                check = %ctx.name,
                node = self.key.target(),
                error = %e,
                "Search cluster ping failed"
            );
        }
        HealthResult::from_outcome(ctx, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use std::time::Duration;

    fn ctx() -> HealthCheckContext {
        HealthCheckContext::new("search", HealthStatus::Unhealthy)
            .with_timeout(Some(Duration::from_secs(5)))
    }

    #[test]
    fn rejects_invalid_options_at_construction() {
        let options = ElasticsearchOptions::with_uri("http://es:9200").api_key("a2V5");
        let err = ElasticsearchHealthCheck::new(options, ConnectionCache::new()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOptions {
                check: "elasticsearch",
                ..
            }
        ));
    }

    #[test]
    fn different_uris_use_different_keys() {
        let cache = ConnectionCache::new();
        let check = |uri: &str| {
            ElasticsearchHealthCheck::new(ElasticsearchOptions::with_uri(uri), cache.clone())
                .unwrap()
        };
        let a = check("http://a:9200");
        let b = check("http://b:9200");
        assert_ne!(a.connection_key(), b.connection_key());
    }

    #[tokio::test]
    async fn unreachable_default_node_is_unhealthy() {
        let cache = ConnectionCache::new();
        let options = ElasticsearchOptions {
            uri: Some(String::new()),
            cloud_id: Some(String::new()),
            ..Default::default()
        };
        let check = ElasticsearchHealthCheck::new(options, cache.clone()).unwrap();

        // Point the cached client at a closed port instead of the local default node.
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);
        cache
            .get_or_create(check.connection_key(), || {
                let closed = ElasticsearchOptions::with_uri(format!("http://{}", addr));
                SearchClient::from_options(&closed)
            })
            .unwrap();

        let result = check.check_health(&ctx(), &CancellationToken::new()).await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(matches!(result.fault.as_deref(), Some(CheckError::Ping { .. })));
    }

    #[tokio::test]
    async fn invalid_cloud_id_reports_setup_failure_and_caches_nothing() {
        let cache = ConnectionCache::new();
        let options = ElasticsearchOptions::with_cloud_id("garbage");
        let check = ElasticsearchHealthCheck::new(options, cache.clone()).unwrap();

        let result = check.check_health(&ctx(), &CancellationToken::new()).await;
        assert!(!result.is_healthy());
        assert!(matches!(
            result.fault.as_deref(),
            Some(CheckError::ClientSetup { .. })
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_ping_is_unhealthy() {
        let options = ElasticsearchOptions::with_uri("http://127.0.0.1:9");
        let check = ElasticsearchHealthCheck::new(options, ConnectionCache::new()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = check.check_health(&ctx(), &cancel).await;
        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.fault.as_deref().is_some_and(CheckError::is_interrupted));
    }
}
