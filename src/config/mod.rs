//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! kiosk.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → KioskConfig (validated, immutable)
//!     → shared via Arc<ArcSwap<_>> to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<KioskConfig>
//!     → subsystems read the new config at their next decision
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Nothing caches thresholds; every decision loads the current snapshot

use std::sync::Arc;

use arc_swap::ArcSwap;

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, BackoffConfig, DisplayConfig, EscalationConfig, HostConfig, HostMode,
    IngressConfig, KioskConfig, LogFormat, NavigationConfig, ObservabilityConfig, ScreenConfig,
    StateConfig, WatchdogConfig, MAX_SCREENS,
};

/// Hot-swappable configuration handle.
pub type SharedConfig = Arc<ArcSwap<KioskConfig>>;

/// Wrap a configuration into a shared handle.
pub fn shared(config: KioskConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}
