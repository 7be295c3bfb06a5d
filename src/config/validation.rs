//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Unique check names
//! - Per-check option validation, the same rules the check constructors apply
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProbeConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::ProbeConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefix the field path, e.g. `uri` → `smtp[relay].uri`.
    pub fn within(mut self, scope: &str) -> Self {
        self.field = format!("{}.{}", scope, self.field);
        self
    }
}

/// Validate a whole probe configuration.
pub fn validate_config(config: &ProbeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.observability.metrics_enabled
        && config.observability.metrics_path.as_os_str().is_empty()
    {
        errors.push(ValidationError::new(
            "observability.metrics_path",
            "must be set when metrics are enabled",
        ));
    }

    let mut seen = HashSet::new();
    for name in config.check_names() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new("name", "check name must not be empty"));
        } else if !seen.insert(name) {
            errors.push(ValidationError::new(
                "name",
                format!("duplicate check name '{}'", name),
            ));
        }
    }

    for check in &config.elasticsearch {
        let scope = format!("elasticsearch[{}]", check.name);
        errors.extend(
            check
                .options
                .validate()
                .into_iter()
                .map(|e| e.within(&scope)),
        );
    }

    for check in &config.smtp {
        let scope = format!("smtp[{}]", check.name);
        errors.extend(
            check
                .options
                .validate()
                .into_iter()
                .map(|e| e.within(&scope)),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
