//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check URL well-formedness and attempt budgets
//! - Return all violations, not just the first

use std::fmt;

use crate::config::schema::ClientConfig;

/// One semantic violation found in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a deserialized config before it is accepted into the system.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.network.is_empty() {
        errors.push(ValidationError {
            field: "network".into(),
            message: "default network must not be empty".into(),
        });
    }

    if let Some(explicit) = &config.url {
        if explicit.parse::<url::Url>().is_err() {
            errors.push(ValidationError {
                field: "url".into(),
                message: format!("'{explicit}' is not a valid URL"),
            });
        }
    }

    for (network, urls) in &config.networks {
        for candidate in urls.http.iter().chain(urls.ws.iter()) {
            if candidate.parse::<url::Url>().is_err() {
                errors.push(ValidationError {
                    field: format!("networks.{network}"),
                    message: format!("'{candidate}' is not a valid URL"),
                });
            }
        }
    }

    for (field, value) in [
        ("trials.connect", config.trials.connect),
        ("trials.query", config.trials.query),
        ("trials.submit", config.trials.submit),
    ] {
        if value == 0 {
            errors.push(ValidationError {
                field: field.into(),
                message: "attempt budget must be at least 1".into(),
            });
        }
    }

    if config.batch_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "batch_timeout_secs".into(),
            message: "batch timeout must be positive".into(),
        });
    }

    // Beyond this the scaling arithmetic overflows u128
    if config.token_decimals > 38 {
        errors.push(ValidationError {
            field: "token_decimals".into(),
            message: "decimal precision out of range".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
