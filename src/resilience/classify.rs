//! Load failure classification.
//!
//! # Classes
//! - Aborted: superseded navigation, ignored everywhere
//! - Network: transport-level failure, retried with backoff
//! - Other: anything else, handled as a session-local structural failure

use crate::surface::LoadError;

/// Chromium net error codes treated as transport failures.
pub const NETWORK_ERROR_CODES: [i32; 12] = [
    -2,   // ERR_FAILED
    -7,   // ERR_TIMED_OUT
    -21,  // ERR_NETWORK_CHANGED
    -100, // ERR_CONNECTION_CLOSED
    -101, // ERR_CONNECTION_RESET
    -102, // ERR_CONNECTION_REFUSED
    -104, // ERR_CONNECTION_FAILED
    -105, // ERR_NAME_NOT_RESOLVED
    -106, // ERR_INTERNET_DISCONNECTED
    -109, // ERR_ADDRESS_UNREACHABLE
    -118, // ERR_CONNECTION_TIMED_OUT
    -137, // ERR_NAME_RESOLUTION_FAILED
];

/// How a failed load should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Aborted,
    Network,
    Other,
}

pub fn is_network_error(code: i32) -> bool {
    NETWORK_ERROR_CODES.contains(&code)
}

/// Classify a raw failure code and message as reported by a surface signal.
pub fn classify_code(code: i32, description: &str) -> FailureClass {
    classify(&LoadError::from_failure(code, description))
}

pub fn classify(error: &LoadError) -> FailureClass {
    match error {
        LoadError::Aborted => FailureClass::Aborted,
        LoadError::Failed { code, .. } if is_network_error(*code) => FailureClass::Network,
        LoadError::Failed { .. } | LoadError::Host(_) => FailureClass::Other,
    }
}
