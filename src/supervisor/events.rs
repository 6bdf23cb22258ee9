//! Inbound signals raised by display surfaces.

use serde::{Deserialize, Serialize};

use crate::health::SessionIndex;
use crate::surface::SurfaceId;

/// One signal from a surface, as posted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceSignal {
    Unresponsive,
    RendererGone {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        exit_code: Option<i32>,
    },
    Closed,
    LoadFailed {
        error_code: i32,
        #[serde(default)]
        description: String,
        #[serde(default)]
        url: String,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
    },
    LoadFinished {
        url: String,
    },
    WillNavigate {
        url: String,
    },
    WillRedirect {
        url: String,
    },
    DidNavigateInPage {
        url: String,
        #[serde(default = "main_frame")]
        is_main_frame: bool,
    },
}

fn main_frame() -> bool {
    true
}

impl SurfaceSignal {
    /// Whether the host waits for a verdict before committing.
    pub fn is_preventable(&self) -> bool {
        matches!(self, SurfaceSignal::WillNavigate { .. } | SurfaceSignal::WillRedirect { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceSignal::Unresponsive => "unresponsive",
            SurfaceSignal::RendererGone { .. } => "renderer_gone",
            SurfaceSignal::Closed => "closed",
            SurfaceSignal::LoadFailed { .. } => "load_failed",
            SurfaceSignal::LoadFinished { .. } => "load_finished",
            SurfaceSignal::WillNavigate { .. } => "will_navigate",
            SurfaceSignal::WillRedirect { .. } => "will_redirect",
            SurfaceSignal::DidNavigateInPage { .. } => "did_navigate_in_page",
        }
    }
}

/// A surface signal together with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceEvent {
    pub index: SessionIndex,
    pub surface: SurfaceId,
    pub signal: SurfaceSignal,
}
