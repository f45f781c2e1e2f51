//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! Validation is a pure function that reports every problem, not just the
//! first.

use reqwest::Method;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("dedup.window_ms must be greater than 0")]
    ZeroWindow,

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("transport.timeout_secs must be greater than 0")]
    ZeroTimeout,

    #[error("invalid transport.base_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid observability.log_level '{0}'")]
    InvalidLogLevel(String),
}

/// Parse a method name case-insensitively.
pub fn parse_method(name: &str) -> Result<Method, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidMethod(name.to_string()));
    }
    Method::from_bytes(trimmed.to_ascii_uppercase().as_bytes())
        .map_err(|_| ValidationError::InvalidMethod(name.to_string()))
}

/// Check a parsed configuration, collecting every error.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.dedup.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if let Some(methods) = &config.dedup.methods {
        for name in methods {
            if let Err(e) = parse_method(name) {
                errors.push(e);
            }
        }
    }

    if config.transport.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if let Some(raw) = &config.transport.base_url {
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::InvalidBaseUrl {
                url: raw.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidBaseUrl {
                url: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
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
