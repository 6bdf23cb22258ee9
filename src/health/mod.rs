//! Session health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Content instrumentation:
//!     Heartbeat { screenIndex, href, video }
//!     → store.rs (merge into record, compute progress)
//!
//! Recovery escalator:
//!     noteRecovery
//!     → store.rs (append to pruned history)
//!
//! Watchdog tick:
//!     → store.rs (read record)
//!     → heartbeat timeout / stream stall decisions
//! ```
//!
//! # Design Decisions
//! - Heartbeat (alive) and progress (stream moving) are tracked separately
//! - A paused or video-less page is healthy-idle, never stalled
//! - Health state is per-session, keyed by a bounded index

pub mod state;
pub mod store;

pub use state::{HealthRecord, Heartbeat, SessionIndex, VideoSummary};
pub use store::HealthStore;
