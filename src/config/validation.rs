//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("observability.log_filter must not be empty")]
    EmptyLogFilter,
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "limits.max_body_bytes",
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }

    let observability = &config.observability;
    if observability.log_filter.trim().is_empty() {
        errors.push(ValidationError::EmptyLogFilter);
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "localhost".into();
        config.timeouts.request_secs = 0;
        config.limits.max_body_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero {
            field: "timeouts.request_secs"
        }));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
