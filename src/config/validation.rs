//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (quota and intervals > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{AppConfig, RateLimitConfig};
use crate::security::admission::{Policy, PolicyError};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("rate_limit.max_calls must be greater than zero")]
    ZeroMaxCalls,

    #[error("rate_limit.period_secs must be a positive number of seconds (got {0})")]
    InvalidPeriod(f64),

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.rate_limit.enabled {
        if let Err(e) = policy_from_config(&config.rate_limit) {
            errors.push(e);
        }
        if config.rate_limit.sweep_interval_secs == 0 {
            errors.push(ValidationError::ZeroInterval("rate_limit.sweep_interval_secs"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroInterval("timeouts.request_secs"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Build the admission policy described by `config`.
pub fn policy_from_config(config: &RateLimitConfig) -> Result<Policy, ValidationError> {
    let period = Duration::try_from_secs_f64(config.period_secs)
        .map_err(|_| ValidationError::InvalidPeriod(config.period_secs))?;

    Policy::new(config.max_calls, period).map_err(|e| match e {
        PolicyError::InvalidMaxCalls(_) => ValidationError::ZeroMaxCalls,
        PolicyError::InvalidPeriod(_) => ValidationError::InvalidPeriod(config.period_secs),
    })
}
