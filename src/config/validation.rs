//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check lease timing relations
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ManagerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("leader_election.lock_name must not be empty")]
    EmptyLockName,

    #[error("leader_election.{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("leader_election.renew_deadline_ms ({renew_deadline_ms}) must be less than lease_duration_ms ({lease_duration_ms})")]
    RenewDeadlineTooLong {
        renew_deadline_ms: u64,
        lease_duration_ms: u64,
    },

    #[error("leader_election.retry_period_ms ({retry_period_ms}) must be less than renew_deadline_ms ({renew_deadline_ms})")]
    RetryPeriodTooLong {
        retry_period_ms: u64,
        renew_deadline_ms: u64,
    },

    #[error("metrics.host {0:?} is not an IP address")]
    InvalidMetricsHost(String),

    #[error("cache.event_buffer must be greater than zero")]
    ZeroEventBuffer,

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let election = &config.leader_election;

    if election.lock_name.trim().is_empty() {
        errors.push(ValidationError::EmptyLockName);
    }

    let durations = [
        ("lease_duration_ms", election.lease_duration_ms),
        ("renew_deadline_ms", election.renew_deadline_ms),
        ("retry_period_ms", election.retry_period_ms),
    ];
    let mut any_zero = false;
    for (field, value) in durations {
        if value == 0 {
            any_zero = true;
            errors.push(ValidationError::ZeroDuration(field));
        }
    }
    if !any_zero {
        if election.renew_deadline_ms >= election.lease_duration_ms {
            errors.push(ValidationError::RenewDeadlineTooLong {
                renew_deadline_ms: election.renew_deadline_ms,
                lease_duration_ms: election.lease_duration_ms,
            });
        }
        if election.retry_period_ms >= election.renew_deadline_ms {
            errors.push(ValidationError::RetryPeriodTooLong {
                retry_period_ms: election.retry_period_ms,
                renew_deadline_ms: election.renew_deadline_ms,
            });
        }
    }

    if config.metrics.address().is_err() {
        errors.push(ValidationError::InvalidMetricsHost(config.metrics.host.clone()));
    }

    if config.cache.event_buffer == 0 {
        errors.push(ValidationError::ZeroEventBuffer);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
