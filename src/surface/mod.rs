//! Window-lifecycle collaborator interface.
//!
//! # Data Flow
//! ```text
//! Supervisor / backoff / drift guard
//!     → SurfaceHost (create, destroy, reload, load, rewrite history)
//!         → remote.rs (HTTP display host)
//!         → headless.rs (in-memory, dry runs and tests)
//!
//! registry.rs:
//!     SessionIndex → live SurfaceId
//! ```
//!
//! # Design Decisions
//! - The host owns windows; the supervisor only holds opaque `SurfaceId`s
//! - Load failures are structured: aborted loads are their own variant
//! - Every call is fallible; callers degrade instead of propagating

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::SessionIndex;

pub mod headless;
pub mod registry;
pub mod remote;

pub use headless::{HeadlessHost, HostOp};
pub use registry::{RecreateGuard, SessionRegistry};
pub use remote::RemoteHost;

/// Chromium's code for a navigation superseded by another.
pub const ERR_ABORTED: i32 = -3;

/// Opaque handle of one display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the host needs to build a session's surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    pub index: SessionIndex,
    /// Explicit destination for this session, overriding configuration.
    pub destination: Option<String>,
    /// Show the host's configuration page when there is nothing to load.
    pub allow_config_fallback: bool,
    pub title_suffix: String,
    pub maximize_hint: bool,
}

/// Options for a destination load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub user_agent: Option<String>,
}

/// Failure talking to the host itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("surface {0} not found")]
    UnknownSurface(SurfaceId),

    #[error("host request failed: {0}")]
    Transport(String),

    #[error("host rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Failure of a URL load inside a surface.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    /// Superseded by another navigation. Never a network failure.
    #[error("load aborted")]
    Aborted,

    #[error("load failed ({code}): {description}")]
    Failed { code: i32, description: String },

    #[error(transparent)]
    Host(#[from] HostError),
}

impl LoadError {
    /// Build a load error from a platform code and message.
    ///
    /// Platforms without a structured abort kind report it as code -3 or as
    /// `ERR_ABORTED` in the message; both map to [`LoadError::Aborted`].
    pub fn from_failure(code: i32, description: impl Into<String>) -> Self {
        let description = description.into();
        if code == ERR_ABORTED || description.contains("ERR_ABORTED") || description.contains("(-3)") {
            return LoadError::Aborted;
        }
        LoadError::Failed { code, description }
    }
}

/// The window-lifecycle collaborator.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Create a surface for a session. The destination is not loaded yet.
    async fn create_surface(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError>;

    async fn destroy_surface(&self, id: SurfaceId) -> Result<(), HostError>;

    /// Whether `id` is still alive. `Err` means the host could not tell.
    async fn surface_exists(&self, id: SurfaceId) -> Result<bool, HostError>;

    async fn reload_surface(&self, id: SurfaceId, bypass_cache: bool) -> Result<(), HostError>;

    /// Load `url`, resolving when the load finished or failed.
    async fn load_url(&self, id: SurfaceId, url: &str, options: &LoadOptions) -> Result<(), LoadError>;

    async fn current_url(&self, id: SurfaceId) -> Result<String, HostError>;

    /// Replace the current history entry with `url` and notify the page of
    /// the change, without a reload.
    async fn rewrite_history(&self, id: SurfaceId, url: &str) -> Result<(), HostError>;
}

/// Shared host handle.
pub type SharedHost = Arc<dyn SurfaceHost>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_detection() {
        assert_eq!(LoadError::from_failure(-3, ""), LoadError::Aborted);
        assert_eq!(LoadError::from_failure(0, "net::ERR_ABORTED (-3) loading 'x'"), LoadError::Aborted);
        assert_eq!(
            LoadError::from_failure(-102, "net::ERR_CONNECTION_REFUSED"),
            LoadError::Failed { code: -102, description: "net::ERR_CONNECTION_REFUSED".into() }
        );
    }
}
