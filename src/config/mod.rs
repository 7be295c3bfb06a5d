//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! probe file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProbeConfig (validated, immutable)
//!     → health::registry builds one check per entry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration_serde;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ProbeConfig;
pub use validation::ValidationError;
