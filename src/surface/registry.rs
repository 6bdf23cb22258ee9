//! Live surface registry.
//!
//! # Responsibilities
//! - Map each session index to its live surface
//! - Tell stale signals (from a replaced surface) apart from current ones
//! - Serialize recreation per session
//!
//! # Design Decisions
//! - Recreate removes the entry before building a replacement, so a racing
//!   reload sees no surface and takes its own recreate path
//! - A RAII guard marks a recreate in progress; dropping it clears the mark

use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::health::SessionIndex;
use crate::observability::metrics;
use crate::surface::SurfaceId;

/// Registry of live surfaces keyed by session index.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    live: Arc<DashMap<SessionIndex, SurfaceId>>,
    recreating: Arc<DashSet<SessionIndex>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: SessionIndex) -> Option<SurfaceId> {
        self.live.get(&index).map(|r| *r.value())
    }

    /// Register `id` as the live surface of `index`, returning the previous one.
    pub fn insert(&self, index: SessionIndex, id: SurfaceId) -> Option<SurfaceId> {
        metrics::record_session_live(index, true);
        self.live.insert(index, id)
    }

    pub fn remove(&self, index: SessionIndex) -> Option<SurfaceId> {
        let removed = self.live.remove(&index).map(|(_, id)| id);
        if removed.is_some() {
            metrics::record_session_live(index, false);
        }
        removed
    }

    /// Remove `index` only while `id` is still its live surface.
    pub fn remove_if_current(&self, index: SessionIndex, id: SurfaceId) -> bool {
        let removed = self.live.remove_if(&index, |_, live| *live == id).is_some();
        if removed {
            metrics::record_session_live(index, false);
        }
        removed
    }

    pub fn is_current(&self, index: SessionIndex, id: SurfaceId) -> bool {
        self.get(index) == Some(id)
    }

    /// Mark a recreate of `index` in progress, or `None` if one already is.
    pub fn begin_recreate(&self, index: SessionIndex) -> Option<RecreateGuard> {
        if !self.recreating.insert(index) {
            return None;
        }
        Some(RecreateGuard {
            index,
            recreating: self.recreating.clone(),
        })
    }

    /// All live surfaces ordered by index.
    pub fn snapshot(&self) -> Vec<(SessionIndex, SurfaceId)> {
        let mut all: Vec<_> = self.live.iter().map(|r| (*r.key(), *r.value())).collect();
        all.sort();
        all
    }
}

/// A RAII guard that marks a recreate in progress for one session.
#[derive(Debug)]
pub struct RecreateGuard {
    index: SessionIndex,
    recreating: Arc<DashSet<SessionIndex>>,
}

impl Drop for RecreateGuard {
    fn drop(&mut self) {
        self.recreating.remove(&self.index);
    }
}
