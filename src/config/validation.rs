//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, capacity > 0)
//! - Check that enabled features have the material they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, StoreBackend};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,

    #[error("auth is enabled but neither auth.hs256_secret nor auth.static_tokens is set")]
    MissingVerifier,

    #[error("store.redis_url is required for the redis backend")]
    MissingRedisUrl,
}

fn non_zero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    let admission = &config.admission;
    if admission.enabled {
        non_zero(&mut errors, "admission.window_secs", admission.window_secs);
        non_zero(&mut errors, "admission.capacity", admission.capacity);
        non_zero(&mut errors, "admission.failure_window_secs", admission.failure_window_secs);
        non_zero(&mut errors, "admission.jail_secs", admission.jail_secs);
    }

    if config.retry.enabled {
        non_zero(
            &mut errors,
            "retry.max_buffered_body_bytes",
            config.retry.max_buffered_body_bytes as u64,
        );
    }

    if config.auth.enabled
        && config.auth.hs256_secret.as_deref().map_or(true, str::is_empty)
        && config.auth.static_tokens.is_empty()
    {
        errors.push(ValidationError::MissingVerifier);
    }

    if config.store.backend == StoreBackend::Redis && config.store.redis_url.is_none() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    non_zero(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);

    if config.observability.metrics_enabled {
        address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
        address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
