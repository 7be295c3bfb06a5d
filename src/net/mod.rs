//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Check invocation
//!     → cache.rs (reusable clients keyed by connection identity)
//!     → tls.rs (client TLS config for per-invocation sessions)
//!     → Hand off to the protocol client
//! ```
//!
//! # Design Decisions
//! - Long-lived clients are shared; session-oriented connections are not
//! - No network I/O happens while building a client

pub mod cache;
pub mod tls;

pub use cache::{ConnectionCache, ConnectionKey};
