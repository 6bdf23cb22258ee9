//! Recovery escalator.
//!
//! # Responsibilities
//! - Note every session-level recovery in the health store
//! - Escalate to a process relaunch once a session needs too many
//!   recoveries inside the sliding window
//! - Rate-limit relaunches with a cooldown persisted across restarts
//!
//! # Design Decisions
//! - The relaunch order is fixed: quitting check, cooldown check, mark
//!   quitting, persist, log, relaunch, exit
//! - Marking quitting is the claim: only the caller that flips the flag
//!   goes on to relaunch
//! - Relaunch and exit failures are logged and swallowed

use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::SharedConfig;
use crate::health::{HealthStore, SessionIndex};
use crate::lifecycle::{ProcessControl, Shutdown};
use crate::observability::metrics;
use crate::recovery::persist::StateStore;

/// Reason used when the recovery threshold is crossed.
pub const TOO_MANY_RECOVERIES: &str = "too_many_recoveries";

/// Result of noting one recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryNote {
    pub recoveries_in_window: usize,
    pub relaunched: bool,
}

/// Context logged with a hard relaunch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaunchContext {
    pub index: Option<SessionIndex>,
    pub recoveries_in_window: Option<usize>,
}

/// Turns repeated session recoveries into a process relaunch.
#[derive(Clone)]
pub struct RecoveryEscalator {
    config: SharedConfig,
    clock: SharedClock,
    health: HealthStore,
    state: StateStore,
    shutdown: Shutdown,
    process: Arc<dyn ProcessControl>,
}

impl RecoveryEscalator {
    pub fn new(
        config: SharedConfig,
        clock: SharedClock,
        health: HealthStore,
        state: StateStore,
        shutdown: Shutdown,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        Self {
            config,
            clock,
            health,
            state,
            shutdown,
            process,
        }
    }

    /// Note one recovery action for `index`.
    pub fn note_recovery(&self, index: SessionIndex, reason: &str) -> RecoveryNote {
        let escalation = self.config.load().escalation.clone();
        let now = self.clock.now_ms();

        let record = self.health.note_recovery(index, now, escalation.recovery_window_ms);
        let in_window = record.recoveries_in_window();

        tracing::warn!(
            index = %index,
            reason = %reason,
            recoveries_in_window = in_window,
            recover_count = record.recover_count,
            "Recovery action"
        );
        metrics::record_recovery(index, reason, in_window);

        let relaunched = in_window >= escalation.hard_restart_threshold
            && self.hard_relaunch(
                TOO_MANY_RECOVERIES,
                RelaunchContext {
                    index: Some(index),
                    recoveries_in_window: Some(in_window),
                },
            );

        RecoveryNote {
            recoveries_in_window: in_window,
            relaunched,
        }
    }

    /// Relaunch the whole process. Returns true when a relaunch was issued.
    pub fn hard_relaunch(&self, reason: &str, context: RelaunchContext) -> bool {
        if self.shutdown.is_quitting() {
            return false;
        }

        let now = self.clock.now_ms();
        let cooldown = self.config.load().escalation.hard_restart_cooldown_ms;
        let last = self.state.relaunch_guard().last_hard_restart_at;
        if last != 0 && now.saturating_sub(last) < cooldown {
            tracing::debug!(
                reason = %reason,
                since_last_ms = now.saturating_sub(last),
                "Hard relaunch suppressed by cooldown"
            );
            return false;
        }

        if !self.shutdown.trigger() {
            tracing::debug!(reason = %reason, "Hard relaunch already claimed");
            return false;
        }

        if let Err(e) = self.state.set_last_hard_restart_at(now) {
            tracing::error!(error = %e, "Failed to persist relaunch guard");
        }

        tracing::error!(
            reason = %reason,
            index = ?context.index.map(SessionIndex::get),
            recoveries_in_window = ?context.recoveries_in_window,
            "Hard relaunch triggered"
        );
        metrics::record_hard_relaunch(reason);

        if let Err(e) = self.process.relaunch() {
            tracing::error!(error = %e, "Process relaunch failed");
        }
        self.process.exit(0);
        true
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }
}
