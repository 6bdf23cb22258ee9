//! In-memory surface host.
//!
//! Backs `host.mode = "headless"` dry runs and the test-suite. Every
//! operation is recorded; failures can be injected per operation kind.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::health::SessionIndex;
use crate::surface::{HostError, LoadError, LoadOptions, SurfaceHost, SurfaceId, SurfaceSpec};

/// URL of a freshly created surface.
pub const INITIAL_URL: &str = "about:blank";

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create { index: SessionIndex, id: SurfaceId },
    Destroy(SurfaceId),
    Reload { id: SurfaceId, bypass_cache: bool },
    Load { id: SurfaceId, url: String },
    RewriteHistory { id: SurfaceId, url: String },
}

/// State of one headless surface.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSurface {
    pub spec: SurfaceSpec,
    pub url: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, HeadlessSurface>,
    ops: Vec<HostOp>,
    fail_creates: bool,
    fail_reloads: bool,
    fail_liveness: bool,
    fail_loads: Option<LoadError>,
}

/// A surface host that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHost {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every operation performed so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    pub fn surface(&self, id: SurfaceId) -> Option<HeadlessSurface> {
        self.lock().surfaces.get(&id).cloned()
    }

    pub fn surface_count(&self) -> usize {
        self.lock().surfaces.len()
    }

    /// Simulate the page navigating by itself.
    pub fn set_url(&self, id: SurfaceId, url: &str) {
        if let Some(surface) = self.lock().surfaces.get_mut(&id) {
            surface.url = url.to_string();
        }
    }

    /// Simulate the window disappearing without the supervisor's involvement.
    pub fn vanish(&self, id: SurfaceId) {
        self.lock().surfaces.remove(&id);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.lock().fail_creates = fail;
    }

    pub fn fail_reloads(&self, fail: bool) {
        self.lock().fail_reloads = fail;
    }

    /// Make liveness checks fail as if the host were unreachable.
    pub fn fail_liveness(&self, fail: bool) {
        self.lock().fail_liveness = fail;
    }

    /// Make every http(s) load fail with `error` until cleared with `None`.
    pub fn fail_loads(&self, error: Option<LoadError>) {
        self.lock().fail_loads = error;
    }

    /// Number of loads of exactly `url`.
    pub fn load_count(&self, url: &str) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, HostOp::Load { url: u, .. } if u == url))
            .count()
    }

    pub fn reload_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, HostOp::Reload { .. }))
            .count()
    }

    pub fn create_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, HostOp::Create { .. }))
            .count()
    }
}

#[async_trait]
impl SurfaceHost for HeadlessHost {
    async fn create_surface(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
        let mut state = self.lock();
        if state.fail_creates {
            return Err(HostError::Transport("create failed".into()));
        }

        state.next_id += 1;
        let id = SurfaceId(state.next_id);
        state.surfaces.insert(
            id,
            HeadlessSurface {
                spec: spec.clone(),
                url: INITIAL_URL.to_string(),
                user_agent: None,
            },
        );
        state.ops.push(HostOp::Create { index: spec.index, id });

        tracing::debug!(index = %spec.index, surface = %id, "Headless surface created");
        Ok(id)
    }

    async fn destroy_surface(&self, id: SurfaceId) -> Result<(), HostError> {
        let mut state = self.lock();
        state.ops.push(HostOp::Destroy(id));
        state
            .surfaces
            .remove(&id)
            .map(|_| ())
            .ok_or(HostError::UnknownSurface(id))
    }

    async fn surface_exists(&self, id: SurfaceId) -> Result<bool, HostError> {
        let state = self.lock();
        if state.fail_liveness {
            return Err(HostError::Transport("liveness check failed".into()));
        }
        Ok(state.surfaces.contains_key(&id))
    }

    async fn reload_surface(&self, id: SurfaceId, bypass_cache: bool) -> Result<(), HostError> {
        let mut state = self.lock();
        state.ops.push(HostOp::Reload { id, bypass_cache });
        if !state.surfaces.contains_key(&id) {
            return Err(HostError::UnknownSurface(id));
        }
        if state.fail_reloads {
            return Err(HostError::Transport("reload failed".into()));
        }
        Ok(())
    }

    async fn load_url(&self, id: SurfaceId, url: &str, options: &LoadOptions) -> Result<(), LoadError> {
        let mut state = self.lock();
        state.ops.push(HostOp::Load { id, url: url.to_string() });

        let failure = state.fail_loads.clone().filter(|_| url.starts_with("http"));
        let surface = state
            .surfaces
            .get_mut(&id)
            .ok_or(HostError::UnknownSurface(id))?;

        if let Some(error) = failure {
            return Err(error);
        }

        surface.url = url.to_string();
        surface.user_agent = options.user_agent.clone();
        Ok(())
    }

    async fn current_url(&self, id: SurfaceId) -> Result<String, HostError> {
        self.lock()
            .surfaces
            .get(&id)
            .map(|s| s.url.clone())
            .ok_or(HostError::UnknownSurface(id))
    }

    async fn rewrite_history(&self, id: SurfaceId, url: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        state.ops.push(HostOp::RewriteHistory { id, url: url.to_string() });
        let surface = state
            .surfaces
            .get_mut(&id)
            .ok_or(HostError::UnknownSurface(id))?;
        surface.url = url.to_string();
        Ok(())
    }
}
