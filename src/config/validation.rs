//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and bind addresses
//! - Validate value ranges (timeouts > 0, delay bounds ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: KioskConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - `display.screens` is clamped on read, never rejected

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::KioskConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL {value:?}")]
    InvalidUrl { field: String, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("backoff: min_delay_ms ({min}) exceeds max_delay_ms ({max})")]
    DelayBounds { min: u64, max: u64 },

    #[error("navigation.drift_paths: {0:?} must start with '/'")]
    DriftPath(String),

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &KioskConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(display) = &config.display {
        check_url(&mut errors, "display.url".to_string(), &display.url, true);
        for (i, screen) in display.screens_config.iter().enumerate() {
            if let Some(url) = &screen.url {
                check_url(&mut errors, format!("display.screens_config[{}].url", i), url, true);
            }
        }
    }

    check_url(&mut errors, "host.control_url".to_string(), &config.host.control_url, false);
    check_url(&mut errors, "host.offline_page".to_string(), &config.host.offline_page, false);

    let non_zero = [
        ("watchdog.tick_interval_ms", config.watchdog.tick_interval_ms),
        ("watchdog.health_timeout_ms", config.watchdog.health_timeout_ms),
        ("watchdog.stall_timeout_ms", config.watchdog.stall_timeout_ms),
        ("escalation.recovery_window_ms", config.escalation.recovery_window_ms),
        ("escalation.hard_restart_threshold", config.escalation.hard_restart_threshold as u64),
        ("backoff.base_delay_ms", config.backoff.base_delay_ms),
        ("backoff.max_delay_ms", config.backoff.max_delay_ms),
        ("host.request_timeout_secs", config.host.request_timeout_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.backoff.min_delay_ms > config.backoff.max_delay_ms {
        errors.push(ValidationError::DelayBounds {
            min: config.backoff.min_delay_ms,
            max: config.backoff.max_delay_ms,
        });
    }

    for path in &config.navigation.drift_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::DriftPath(path.clone()));
        }
    }

    let mut addresses = vec![("ingress.bind_address", &config.ingress.bind_address)];
    if config.admin.enabled {
        addresses.push(("admin.bind_address", &config.admin.bind_address));
    }
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress { field, value: value.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: String, value: &str, allow_empty: bool) {
    let trimmed = value.trim();
    if trimmed.is_empty() && allow_empty {
        return;
    }
    if Url::parse(trimmed).is_err() {
        errors.push(ValidationError::InvalidUrl { field, value: value.to_string() });
    }
}
