//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Addresses must be IPv4 dotted quads, ports in [1, 65535]
//! - Every timeout and the transfer buffer must be non-zero
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is opened

use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field}: {value:?} is not an IPv4 address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid {field}: port must be in 1..=65535")]
    InvalidPort { field: &'static str },

    #[error("invalid timeouts.{field}: must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("invalid transfer.buffer_bytes: must be greater than zero")]
    ZeroBuffer,

    #[error("invalid observability.metrics_address: {0:?}")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "bind_ip", &config.listener.bind_address);
    check_port(&mut errors, "bind_port", config.listener.bind_port);
    check_address(&mut errors, "connect_ip", &config.target.address);
    check_port(&mut errors, "connect_port", config.target.port);

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("accept_ms", timeouts.accept_ms),
        ("wait_ms", timeouts.wait_ms),
        ("connect_ms", timeouts.connect_ms),
        ("send_ms", timeouts.send_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout { field });
        }
    }

    if config.transfer.buffer_bytes == 0 {
        errors.push(ValidationError::ZeroBuffer);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<Ipv4Addr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_port(errors: &mut Vec<ValidationError>, field: &'static str, port: u16) {
    if port == 0 {
        errors.push(ValidationError::InvalidPort { field });
    }
}
