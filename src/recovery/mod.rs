//! Recovery escalation subsystem.
//!
//! # Data Flow
//! ```text
//! Watchdog / supervisor recovery
//!     → escalator.rs (note recovery, sliding window count)
//!     → threshold crossed → hard relaunch
//!         → persist.rs (cooldown check, write lastHardRestartAt)
//!         → ProcessControl (relaunch, exit)
//! ```
//!
//! # Design Decisions
//! - One session crossing the threshold relaunches the whole process
//! - The relaunch cooldown outlives the process

pub mod escalator;
pub mod persist;

pub use escalator::{RecoveryEscalator, RecoveryNote, RelaunchContext, TOO_MANY_RECOVERIES};
pub use persist::{RelaunchGuard, StateError, StateStore};
