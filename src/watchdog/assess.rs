//! Per-session liveness assessment.
//!
//! Pure function of the session's surface state and health record; the
//! monitor acts on the verdict.

use std::fmt;

use serde::Serialize;

use crate::config::WatchdogConfig;
use crate::health::HealthRecord;

/// URL prefixes of placeholder and error pages.
pub const PLACEHOLDER_PREFIXES: [&str; 2] = ["about:blank", "chrome-error://"];

/// Why a session needs recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryReason {
    BlankOrErrorUrl,
    HeartbeatTimeout,
    StreamStall,
}

impl RecoveryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryReason::BlankOrErrorUrl => "blank_or_error_url",
            RecoveryReason::HeartbeatTimeout => "heartbeat_timeout",
            RecoveryReason::StreamStall => "stream_stall",
        }
    }
}

impl fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "reason")]
pub enum Verdict {
    /// No live surface: recreate.
    Missing,
    /// Note a recovery and reload.
    Recover(RecoveryReason),
    /// Unhealthy, but a recent recovery is still settling.
    CoolingDown(RecoveryReason),
    Healthy,
}

pub fn is_placeholder_url(url: &str) -> bool {
    PLACEHOLDER_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Assess one session at `now`.
///
/// Checks run in order and the first match wins. A placeholder URL only
/// matches while recovery is allowed; otherwise the heartbeat and stall
/// checks still get their turn.
pub fn assess(
    now: u64,
    present: bool,
    current_url: &str,
    record: &HealthRecord,
    config: &WatchdogConfig,
) -> Verdict {
    if !present {
        return Verdict::Missing;
    }

    let allow_recover = record
        .last_recover_at
        .map_or(true, |at| now.saturating_sub(at) > config.recover_cooldown_ms);
    let gated = |reason| {
        if allow_recover {
            Verdict::Recover(reason)
        } else {
            Verdict::CoolingDown(reason)
        }
    };

    if allow_recover && is_placeholder_url(current_url) {
        return Verdict::Recover(RecoveryReason::BlankOrErrorUrl);
    }

    if let Some(seen) = record.last_seen_at {
        if now.saturating_sub(seen) > config.health_timeout_ms {
            return gated(RecoveryReason::HeartbeatTimeout);
        }
    }

    if let Some(progress) = record.last_progress_at {
        if now.saturating_sub(progress) > config.stall_timeout_ms {
            return gated(RecoveryReason::StreamStall);
        }
    }

    Verdict::Healthy
}
