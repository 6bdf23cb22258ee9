//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Load failure from a surface:
//!     → classify.rs (aborted / network / other)
//!     → network.rs (offline page, single pending retry per session)
//!     → backoff.rs (retry delay for the current attempt)
//! ```
//!
//! # Design Decisions
//! - Aborted loads never count as failures
//! - Only transport-level failures are retried here; other failures are
//!   session-local and go through recovery instead
//! - Retry delays are bounded on both sides

pub mod backoff;
pub mod classify;
pub mod network;

pub use backoff::retry_delay;
pub use classify::{classify, classify_code, is_network_error, FailureClass};
pub use network::{FailureOutcome, NetworkBackoff, RetryState};
