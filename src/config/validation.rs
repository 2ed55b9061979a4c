//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use tokio::sync::Semaphore;

use crate::config::schema::ProxyConfig;

/// Smallest line limit that still fits a realistic request line.
const MIN_LINE_LENGTH: usize = 64;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    match config.listener.max_connections {
        Some(0) => errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero when set",
        )),
        Some(n) if n > Semaphore::MAX_PERMITS => errors.push(ValidationError::new(
            "listener.max_connections",
            format!("must be at most {}", Semaphore::MAX_PERMITS),
        )),
        _ => {}
    }

    if config.cache.max_object_size == 0 {
        errors.push(ValidationError::new(
            "cache.max_object_size",
            "must be greater than zero",
        ));
    } else if config.cache.max_cache_size < config.cache.max_object_size {
        errors.push(ValidationError::new(
            "cache.max_cache_size",
            "must hold at least one object",
        ));
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.read_secs", config.timeouts.read_secs),
        ("timeouts.write_secs", config.timeouts.write_secs),
    ];
    for (field, value) in timeouts {
        if value == Some(0) {
            errors.push(ValidationError::new(field, "must be greater than zero when set"));
        }
    }

    if config.limits.max_line_length < MIN_LINE_LENGTH {
        errors.push(ValidationError::new(
            "limits.max_line_length",
            format!("must be at least {} bytes", MIN_LINE_LENGTH),
        ));
    }
    if config.limits.max_headers == 0 {
        errors.push(ValidationError::new(
            "limits.max_headers",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                "is not a socket address",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
