//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProbeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and check construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    /// Options handed to a check constructor were rejected.
    #[error("Invalid {check} options: {}", join(.errors))]
    InvalidOptions {
        check: &'static str,
        errors: Vec<ValidationError>,
    },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProbeConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        path = %path.display(),
        elasticsearch = config.elasticsearch.len(),
        smtp = config.smtp.len(),
        "Configuration loaded"
    );

    Ok(config)
}
