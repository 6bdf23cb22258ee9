//! Navigation subsystem.
//!
//! # Data Flow
//! ```text
//! Surface navigation signal (will-navigate / will-redirect / in-page)
//!     → destination.rs (desired URL and path for the session)
//!     → drift.rs (drift detection, prevention, soft correction)
//!     → SurfaceHost (load desired URL / rewrite history)
//! ```
//!
//! # Design Decisions
//! - Desired destination: session override, else per-screen URL, else global URL
//! - Paths compare without trailing slashes

pub mod destination;
pub mod drift;

pub use destination::{normalize_path, Destinations};
pub use drift::{Drift, DriftGuard, NavigationTrigger, NavigationVerdict};
