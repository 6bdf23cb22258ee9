//! Diagnostic viewer events.
//!
//! Events posted by the content instrumentation are logged and otherwise
//! ignored. Noisy event types are throttled per session.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

/// Maximum logged length of a reported stack, in characters.
pub const MAX_STACK_CHARS: usize = 1_200;

/// Event types logged at most once per [`ENFORCER_LOG_GAP_MS`].
const THROTTLED_TYPES: [&str; 1] = ["url_enforcer_started"];

pub const ENFORCER_LOG_GAP_MS: u64 = 60_000;

/// Diagnostic event from the content instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerEvent {
    pub screen_index: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "at")]
    pub at_ms: Option<u64>,
    pub at_iso: Option<String>,
    pub from_path: Option<String>,
    pub to_path: Option<String>,
    pub note: Option<String>,
    pub href: Option<String>,
    pub referrer: Option<String>,
    pub nav_type: Option<String>,
    pub redirect_count: Option<u32>,
    pub visibility_state: Option<String>,
    pub has_focus: Option<bool>,
    pub stack: Option<String>,
}

/// Logs viewer events with per-(session, type) throttling.
#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    clock: SharedClock,
    last_logged: Arc<DashMap<(Option<i64>, String), u64>>,
}

impl DiagnosticsLog {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            last_logged: Arc::new(DashMap::new()),
        }
    }

    /// Log `event`. Returns false when it was empty or throttled.
    pub fn record(&self, event: &ViewerEvent) -> bool {
        if event.kind.is_empty() {
            return false;
        }

        let now = self.clock.now_ms();
        if THROTTLED_TYPES.contains(&event.kind.as_str()) {
            let key = (event.screen_index, event.kind.clone());
            let mut last = self.last_logged.entry(key).or_insert(0);
            if *last != 0 && now.saturating_sub(*last) < ENFORCER_LOG_GAP_MS {
                return false;
            }
            *last = now;
        }

        let stack = event.stack.as_deref().map(truncate_stack);
        tracing::info!(
            screen_index = ?event.screen_index,
            event_type = %event.kind,
            at_ms = event.at_ms.unwrap_or(now),
            at_iso = ?event.at_iso,
            from_path = ?event.from_path,
            to_path = ?event.to_path,
            note = ?event.note,
            href = ?event.href,
            referrer = ?event.referrer,
            nav_type = ?event.nav_type,
            redirect_count = ?event.redirect_count,
            visibility_state = ?event.visibility_state,
            has_focus = ?event.has_focus,
            stack = ?stack,
            "Viewer event"
        );
        true
    }
}

pub fn truncate_stack(stack: &str) -> String {
    stack.chars().take(MAX_STACK_CHARS).collect()
}
