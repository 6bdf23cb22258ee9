//! Watchdog subsystem.
//!
//! # Data Flow
//! ```text
//! Ticker (tick_interval_ms)
//!     → monitor.rs (for each configured session)
//!         → SessionRegistry + SurfaceHost (present? current URL)
//!         → HealthStore (record)
//!         → assess.rs (verdict)
//!     → Missing        → Supervisor::recreate
//!     → Recover(reason) → RecoveryEscalator::note_recovery → Supervisor::reload
//! ```
//!
//! # Design Decisions
//! - Checks are ordered and mutually exclusive per tick
//! - Reload and recovery noting are gated by a per-session cooldown;
//!   recreating a missing session is not

pub mod assess;
pub mod monitor;

pub use assess::{assess, is_placeholder_url, RecoveryReason, Verdict};
pub use monitor::Watchdog;
