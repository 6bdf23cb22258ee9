//! Exponential retry delay.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Delay before retry number `attempt`.
///
/// `base * 2^min(max_exponent, attempt)`, clamped to `[min_delay, max_delay]`.
pub fn retry_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    let exponent = attempt.min(config.max_exponent);
    let raw = config.base_delay_ms.saturating_mul(2u64.saturating_pow(exponent));

    Duration::from_millis(raw.max(config.min_delay_ms).min(config.max_delay_ms))
}
