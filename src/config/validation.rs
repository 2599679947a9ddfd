//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject reboot signals that collide with shutdown or cannot be caught
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GraceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GraceConfig;
use crate::lifecycle::signals::parse_reboot_signal;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("lifecycle.shutdown_timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,
    #[error("lifecycle.reboot_signal {0:?} is not a catchable non-shutdown signal")]
    InvalidRebootSignal(String),
    #[error("{field} {value:?} is not a socket address")]
    InvalidAddress { field: &'static str, value: String },
    #[error("listener.inherit_fd must be 3 or above, got {0}")]
    InheritFdClashesWithStdio(i32),
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &GraceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }
    if parse_reboot_signal(&config.lifecycle.reboot_signal).is_none() {
        errors.push(ValidationError::InvalidRebootSignal(
            config.lifecycle.reboot_signal.clone(),
        ));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.inherit_fd < 3 {
        errors.push(ValidationError::InheritFdClashesWithStdio(
            config.listener.inherit_fd,
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
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
