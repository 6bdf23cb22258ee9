//! Signal ingress subsystem.
//!
//! # Data Flow
//! ```text
//! Content instrumentation / display host
//!     → server.rs (Axum, JSON bodies)
//!         heartbeat → Supervisor::handle_heartbeat
//!         event     → diagnostics.rs (throttled log)
//!         surface   → Supervisor::handle_surface_event → verdict
//! ```

pub mod diagnostics;
pub mod server;

pub use diagnostics::{DiagnosticsLog, ViewerEvent};
pub use server::{IngressError, IngressServer, IngressState, VerdictResponse};
