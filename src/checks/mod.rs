//! Bundled dependency checks.
//!
//! Each submodule owns its options, its protocol client and one
//! [`HealthCheck`](crate::health::HealthCheck) implementation.

pub mod elasticsearch;
pub mod smtp;

pub use elasticsearch::ElasticsearchHealthCheck;
pub use smtp::SmtpHealthCheck;
