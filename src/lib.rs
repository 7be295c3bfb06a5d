//! Dependency health probes.
//!
//! Independent checks that verify an external dependency is reachable and
//! responsive, each returning a normalized [`HealthResult`].

pub mod checks;
pub mod config;
pub mod health;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::ProbeConfig;
pub use health::{HealthCheck, HealthCheckContext, HealthResult, HealthStatus};
pub use net::ConnectionCache;
pub use resilience::CancellationToken;
