//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe step (connect / authenticate / ping):
//!     → timeouts.rs (race against cancellation + optional deadline)
//!     → cancellation.rs (signal shared by the whole invocation)
//!     → Interrupt value on failure, mapped into the health result
//! ```
//!
//! # Design Decisions
//! - Every network-bound step has a deadline or a cancellation point
//! - A single token is threaded through every suspension point of a check
//! - Interruption is an ordinary outcome, never an escaping fault

pub mod cancellation;
pub mod timeouts;

pub use cancellation::CancellationToken;
pub use timeouts::{with_cancellation, Interrupt};
