//! Per-session health record and the heartbeat that feeds it.
//!
//! # Progress Rules
//! ```text
//! prev, new both defined:  progress = new + 2 < prev   (stream restart)
//!                                   || new > prev + 0.25
//! prev undefined:          progress = new defined
//! href changed:            progress = true
//! not trackable:           last_progress_at = now (healthy idle)
//! ```
//!
//! # Design Decisions
//! - Records are values; updates build a new record and replace the old one
//! - `recover_history` is pruned lazily when a recovery is noted
//! - A heartbeat always refreshes `last_seen_at`, trackable or not

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MAX_SCREENS;

/// A regression larger than this is a stream restart, not a stall.
pub const RESTART_REGRESSION: f64 = 2.0;

/// Minimum forward movement of the playback position that counts as progress.
pub const MIN_ADVANCE: f64 = 0.25;

/// Bounded session identifier, `0..MAX_SCREENS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SessionIndex(u8);

impl SessionIndex {
    /// Create an index, or `None` when out of range.
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_SCREENS).then_some(Self(index as u8))
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// All indices below `count` (itself clamped to `MAX_SCREENS`).
    pub fn range(count: usize) -> impl Iterator<Item = SessionIndex> {
        (0..count.min(MAX_SCREENS)).map(|i| Self(i as u8))
    }
}

impl TryFrom<i64> for SessionIndex {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| format!("session index {} out of range 0..{}", value, MAX_SCREENS))
    }
}

impl From<SessionIndex> for u8 {
    fn from(index: SessionIndex) -> Self {
        index.0
    }
}

impl fmt::Display for SessionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media state reported by the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoSummary {
    /// Number of active media elements.
    pub count: u32,
    /// Whether any of them is playing.
    pub any_playing: bool,
    /// Highest playback position among them.
    pub max_current_time: Option<f64>,
}

impl VideoSummary {
    /// Stall tracking only applies while something is actually playing.
    pub fn is_trackable(&self) -> bool {
        self.count > 0 && self.any_playing
    }

    fn position(&self) -> Option<f64> {
        self.max_current_time.filter(|t| t.is_finite())
    }
}

/// Liveness signal posted by the content instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub screen_index: SessionIndex,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub video: VideoSummary,
}

/// Health of one session. Created lazily, never deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthRecord {
    pub last_seen_at: Option<u64>,
    pub last_href: String,
    pub last_video: Option<VideoSummary>,
    pub last_max_current_time: Option<f64>,
    pub last_progress_at: Option<u64>,
    pub last_recover_at: Option<u64>,
    pub recover_count: u64,
    pub recover_history: Vec<u64>,
}

impl HealthRecord {
    /// The record after merging `heartbeat` at `now`.
    pub fn with_heartbeat(&self, heartbeat: &Heartbeat, now: u64) -> Self {
        let position = heartbeat.video.position();

        let mut progress = has_progress(self.last_max_current_time, position);
        if !self.last_href.is_empty() && !heartbeat.href.is_empty() && heartbeat.href != self.last_href {
            progress = true;
        }

        let last_progress_at = if heartbeat.video.is_trackable() {
            if progress {
                now
            } else {
                self.last_progress_at.unwrap_or(now).min(now)
            }
        } else {
            now
        };

        Self {
            last_seen_at: Some(now),
            last_href: heartbeat.href.clone(),
            last_video: Some(heartbeat.video.clone()),
            last_max_current_time: position.or(self.last_max_current_time),
            last_progress_at: Some(last_progress_at),
            ..self.clone()
        }
    }

    /// The record after noting a recovery at `now`, pruning history older than `window_ms`.
    pub fn with_recovery(&self, now: u64, window_ms: u64) -> Self {
        let mut recover_history: Vec<u64> = self
            .recover_history
            .iter()
            .copied()
            .filter(|&t| now.saturating_sub(t) < window_ms)
            .collect();
        recover_history.push(now);

        Self {
            last_recover_at: Some(now),
            recover_count: self.recover_count + 1,
            recover_history,
            ..self.clone()
        }
    }

    pub fn recoveries_in_window(&self) -> usize {
        self.recover_history.len()
    }
}

/// Whether the playback position moved from `prev` to `new`.
pub fn has_progress(prev: Option<f64>, new: Option<f64>) -> bool {
    match (prev, new) {
        (Some(prev), Some(new)) => new + RESTART_REGRESSION < prev || new > prev + MIN_ADVANCE,
        (None, new) => new.is_some(),
        (Some(_), None) => false,
    }
}
