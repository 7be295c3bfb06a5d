//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Aggregator / CLI
//!     → registry.rs (context per registration, span, metrics)
//!     → check.rs (HealthCheck::check_health)
//!     → concrete check probes its dependency
//!     → result.rs (normalize outcome into Healthy / failure status)
//! ```
//!
//! # Design Decisions
//! - Checks never fail: faults become results carrying the fault
//! - Severity comes from the registration, not the check
//! - Each failure path has a named variant in error.rs

pub mod check;
pub mod error;
pub mod registry;
pub mod result;

pub use check::{HealthCheck, HealthCheckContext};
pub use error::{CheckError, ProbeStage};
pub use registry::{build_registrations, run_all, run_check, Registration};
pub use result::{HealthReportEntry, HealthResult, HealthStatus};
