//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout / rolling log file
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every recovery decision is logged with index, reason and counts so it
//!   can be reconstructed after the fact
//! - Noisy failure paths throttle their own log lines
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
