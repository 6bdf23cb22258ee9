//! Session health store.
//!
//! # Responsibilities
//! - Merge heartbeats into per-session records
//! - Note recovery actions and keep the sliding recovery history
//! - Hand out consistent snapshots to the watchdog and admin API
//!
//! # Design Decisions
//! - Whole-record replace under the DashMap shard lock: readers see the old
//!   or the new record, never a partial one
//! - Records are created on first write and never removed

use std::sync::Arc;

use dashmap::DashMap;

use crate::health::state::{HealthRecord, Heartbeat, SessionIndex};
use crate::observability::metrics;

/// Registry of health records keyed by session index.
#[derive(Debug, Clone, Default)]
pub struct HealthStore {
    records: Arc<DashMap<SessionIndex, HealthRecord>>,
}

impl HealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a heartbeat received at `now` and return the updated record.
    pub fn record_heartbeat(&self, heartbeat: &Heartbeat, now: u64) -> HealthRecord {
        let mut entry = self.records.entry(heartbeat.screen_index).or_default();
        let updated = entry.with_heartbeat(heartbeat, now);
        *entry = updated.clone();
        drop(entry);

        metrics::record_heartbeat();
        updated
    }

    /// Note a recovery at `now`, pruning history older than `window_ms`.
    pub fn note_recovery(&self, index: SessionIndex, now: u64, window_ms: u64) -> HealthRecord {
        let mut entry = self.records.entry(index).or_default();
        let updated = entry.with_recovery(now, window_ms);
        *entry = updated.clone();
        updated
    }

    /// Current record for `index`, or an empty default.
    pub fn get_record(&self, index: SessionIndex) -> HealthRecord {
        self.records
            .get(&index)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// All known records ordered by index.
    pub fn snapshot(&self) -> Vec<(SessionIndex, HealthRecord)> {
        let mut all: Vec<_> = self
            .records
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        all.sort_by_key(|(index, _)| *index);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::VideoSummary;

    fn index(i: usize) -> SessionIndex {
        SessionIndex::new(i).unwrap()
    }

    fn heartbeat(i: usize, at: f64) -> Heartbeat {
        Heartbeat {
            screen_index: index(i),
            href: "https://nvr.local/protect/dashboard/abc".into(),
            video: VideoSummary { count: 1, any_playing: true, max_current_time: Some(at) },
        }
    }

    #[test]
    fn test_missing_record_is_default() {
        let store = HealthStore::new();
        assert_eq!(store.get_record(index(3)), HealthRecord::default());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_last_seen_tracks_latest_heartbeat() {
        let store = HealthStore::new();
        for (n, now) in [1_000u64, 4_000, 9_000, 9_500].into_iter().enumerate() {
            store.record_heartbeat(&heartbeat(1, n as f64), now);
            assert_eq!(store.get_record(index(1)).last_seen_at, Some(now));
        }
    }

    #[test]
    fn test_increasing_position_advances_progress() {
        let store = HealthStore::new();
        let mut now = 0;
        for step in 0..6 {
            now += 5_000;
            store.record_heartbeat(&heartbeat(0, 10.0 + step as f64 * 0.3), now);
            assert_eq!(store.get_record(index(0)).last_progress_at, Some(now));
        }
    }

    #[test]
    fn test_flat_or_small_regression_does_not_advance() {
        let store = HealthStore::new();
        store.record_heartbeat(&heartbeat(0, 10.0), 1_000);
        for (now, at) in [(5_000, 10.0), (9_000, 9.0), (13_000, 8.5), (17_000, 8.6)] {
            store.record_heartbeat(&heartbeat(0, at), now);
            assert_eq!(store.get_record(index(0)).last_progress_at, Some(1_000));
        }
    }

    #[test]
    fn test_large_regression_is_a_restart() {
        let store = HealthStore::new();
        store.record_heartbeat(&heartbeat(0, 300.0), 1_000);
        store.record_heartbeat(&heartbeat(0, 0.5), 5_000);
        assert_eq!(store.get_record(index(0)).last_progress_at, Some(5_000));
    }

    #[test]
    fn test_recovery_keeps_heartbeat_fields() {
        let store = HealthStore::new();
        store.record_heartbeat(&heartbeat(2, 1.0), 1_000);
        let record = store.note_recovery(index(2), 2_000, 600_000);

        assert_eq!(record.last_seen_at, Some(1_000));
        assert_eq!(record.recover_count, 1);
        assert_eq!(store.snapshot().len(), 1);
    }
}
