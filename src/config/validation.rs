//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, delays ordered)
//! - Validate addresses and upstream URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    for (name, over) in &config.circuit_breaker.overrides {
        if over.failure_threshold == Some(0) {
            errors.push(ValidationError::new(
                format!("circuit_breaker.overrides.{name}.failure_threshold"),
                "must be at least 1",
            ));
        }
    }

    if config.cache.max_entries == Some(0) {
        errors.push(ValidationError::new("cache.max_entries", "must be at least 1 when set"));
    }

    for pattern in &config.auth.exempt_paths {
        if !pattern.starts_with('/') {
            errors.push(ValidationError::new(
                "auth.exempt_paths",
                format!("pattern '{pattern}' must start with '/'"),
            ));
        }
    }

    if Url::parse(&config.upstream.weather.url).is_err() {
        errors.push(ValidationError::new("upstream.weather.url", "not a valid URL"));
    }
    match config.upstream.sms.provider.as_str() {
        "mock" => {}
        "http" => {
            if Url::parse(&config.upstream.sms.url).is_err() {
                errors.push(ValidationError::new("upstream.sms.url", "not a valid URL"));
            }
        }
        other => errors.push(ValidationError::new(
            "upstream.sms.provider",
            format!("unknown provider '{other}' (expected 'mock' or 'http')"),
        )),
    }

    for (name, peer) in &config.upstream.peers {
        match Url::parse(&peer.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => errors.push(ValidationError::new(
                format!("upstream.peers.{name}.base_url"),
                "not a valid http(s) URL",
            )),
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
