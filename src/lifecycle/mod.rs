//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal or hard relaunch → quitting flag set → watchdog/ingress/admin stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//!
//! Process (process.rs):
//!     Hard relaunch → spawn fresh process → exit
//!
//! Startup (startup.rs):
//!     Host → supervisor → listeners → sessions → watchdog → wait for shutdown
//! ```
//!
//! # Design Decisions
//! - The quitting flag is checked first in every callback that could touch a
//!   surface, so teardown never races a recovery
//! - The flag is one-way; nothing un-quits

pub mod process;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use process::{OsProcess, ProcessControl};
pub use shutdown::Shutdown;
