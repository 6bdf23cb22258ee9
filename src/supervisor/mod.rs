//! Session supervisor.
//!
//! # Responsibilities
//! - Create every configured session and load its destination
//! - Reload and recreate sessions, degrading reload → recreate
//! - Dispatch heartbeats and surface signals into the health store, the
//!   network backoff, the drift guard and the escalator
//!
//! # Data Flow
//! ```text
//! Heartbeat      → HealthStore
//! SurfaceEvent   → stale check (registry)
//!     Unresponsive  → note recovery → reload
//!     RendererGone  → note recovery → recreate
//!     Closed        → note recovery → recreate
//!     LoadFailed    → NetworkBackoff | note recovery → reload
//!     LoadFinished  → NetworkBackoff (reset on desired origin)
//!     Will*/InPage  → DriftGuard
//! ```
//!
//! # Design Decisions
//! - The quitting flag is checked before any action that touches a surface
//! - Recovery is always noted before the recreate it causes
//! - Signals from a surface that is no longer registered are dropped
//! - Host failures are logged and degraded, never propagated past here

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::SharedClock;
use crate::config::SharedConfig;
use crate::health::{HealthRecord, HealthStore, Heartbeat, SessionIndex};
use crate::lifecycle::{ProcessControl, Shutdown};
use crate::navigation::{Destinations, DriftGuard, NavigationTrigger, NavigationVerdict};
use crate::observability::metrics;
use crate::recovery::{RecoveryEscalator, StateStore};
use crate::resilience::{classify_code, is_network_error, FailureClass, NetworkBackoff};
use crate::surface::{HostError, LoadError, LoadOptions, SessionRegistry, SharedHost, SurfaceId, SurfaceSpec};

pub mod events;

pub use events::{SurfaceEvent, SurfaceSignal};

/// Throttle window for `did-fail-load` logs.
const FAIL_LOG_THROTTLE_MS: u64 = 2_000;

/// Minimum spacing of recoveries caused by non-network load failures.
const FAIL_FIX_THROTTLE_MS: u64 = 1_500;

/// Delay between a non-network load failure and its reload.
const FAIL_RELOAD_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
struct FailThrottle {
    surface: SurfaceId,
    last_log_at: u64,
    last_fix_at: u64,
}

/// The self-healing supervisor.
#[derive(Clone)]
pub struct Supervisor {
    config: SharedConfig,
    clock: SharedClock,
    host: SharedHost,
    shutdown: Shutdown,
    registry: SessionRegistry,
    health: HealthStore,
    destinations: Destinations,
    backoff: NetworkBackoff,
    drift: DriftGuard,
    escalator: RecoveryEscalator,
    fail_throttle: Arc<DashMap<SessionIndex, FailThrottle>>,
}

impl Supervisor {
    pub fn new(
        config: SharedConfig,
        clock: SharedClock,
        host: SharedHost,
        state: StateStore,
        shutdown: Shutdown,
        process: Arc<dyn ProcessControl>,
    ) -> Self {
        let registry = SessionRegistry::new();
        let health = HealthStore::new();
        let destinations = Destinations::new(config.clone());

        let backoff = NetworkBackoff::new(
            config.clone(),
            clock.clone(),
            host.clone(),
            registry.clone(),
            destinations.clone(),
            shutdown.clone(),
        );
        let drift = DriftGuard::new(
            config.clone(),
            clock.clone(),
            host.clone(),
            destinations.clone(),
            shutdown.clone(),
        );
        let escalator = RecoveryEscalator::new(
            config.clone(),
            clock.clone(),
            health.clone(),
            state,
            shutdown.clone(),
            process,
        );

        Self {
            config,
            clock,
            host,
            shutdown,
            registry,
            health,
            destinations,
            backoff,
            drift,
            escalator,
            fail_throttle: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn health(&self) -> &HealthStore {
        &self.health
    }

    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    pub fn backoff(&self) -> &NetworkBackoff {
        &self.backoff
    }

    pub fn drift(&self) -> &DriftGuard {
        &self.drift
    }

    pub fn escalator(&self) -> &RecoveryEscalator {
        &self.escalator
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            user_agent: Some(self.config.load().host.user_agent.clone()),
        }
    }

    /// Create the surface of one session and load its destination.
    pub async fn create_session(
        &self,
        index: SessionIndex,
        destination: Option<String>,
        allow_config_fallback: bool,
        title_suffix: String,
        maximize_hint: bool,
    ) -> Result<SurfaceId, HostError> {
        self.destinations.set_override(index, destination);
        let desired = self.destinations.desired_url(index);

        let spec = SurfaceSpec {
            index,
            destination: desired.clone(),
            allow_config_fallback,
            title_suffix,
            maximize_hint,
        };
        let id = self.host.create_surface(&spec).await?;

        if let Some(previous) = self.registry.insert(index, id) {
            tracing::debug!(index = %index, previous = %previous, surface = %id, "Replaced registered surface");
        }
        self.backoff.forget(index);
        self.drift.forget(index);
        self.fail_throttle.remove(&index);

        tracing::info!(index = %index, surface = %id, title = %spec.title_suffix, "Session created");

        match desired {
            Some(url) => self.initial_load(index, id, &url).await,
            None if allow_config_fallback => {
                tracing::info!(index = %index, "No destination configured; host shows its configuration page");
            }
            None => {
                tracing::warn!(index = %index, "No destination configured for session");
            }
        }

        Ok(id)
    }

    async fn initial_load(&self, index: SessionIndex, id: SurfaceId, url: &str) {
        let error = match self.host.load_url(id, url, &self.load_options()).await {
            Ok(()) | Err(LoadError::Aborted) => return,
            Err(e) => e,
        };

        tracing::warn!(index = %index, error = %error, "Initial load failed");

        let (code, description) = match &error {
            LoadError::Failed { code, description } => (*code, description.clone()),
            other => (0, other.to_string()),
        };
        let on_http_page = self
            .host
            .current_url(id)
            .await
            .map(|current| current.starts_with("http"))
            .unwrap_or(false);

        if is_network_error(code) || !on_http_page {
            self.backoff.show_offline_and_retry(index, id, code, &description);
        }
    }

    /// Create every configured session, or a single fallback session when
    /// there is no display configuration. Returns the number created.
    pub async fn create_all(&self) -> usize {
        let config = self.config.load_full();
        let Some(display) = config.display.as_ref() else {
            let Some(index) = SessionIndex::new(0) else {
                return 0;
            };
            return match self.create_session(index, None, true, String::new(), false).await {
                Ok(_) => 1,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create fallback session");
                    0
                }
            };
        };

        let count = display.screen_count();
        let mut created = 0;
        for index in SessionIndex::range(count) {
            let (title, maximize) = session_layout(count, display.screen(index.get()).maximize, index);
            match self.create_session(index, None, false, title, maximize).await {
                Ok(_) => created += 1,
                Err(e) => tracing::error!(index = %index, error = %e, "Failed to create session"),
            }
        }
        created
    }

    /// Reload a session bypassing the cache, recreating it when the surface
    /// is gone or the reload fails. Returns true when a reload was issued.
    pub async fn reload(&self, index: SessionIndex) -> bool {
        if self.shutdown.is_quitting() {
            return false;
        }

        let live = match self.registry.get(index) {
            Some(id) => match self.host.surface_exists(id).await {
                Ok(exists) => exists.then_some(id),
                // a failing reload still falls back to recreate
                Err(e) => {
                    tracing::debug!(index = %index, surface = %id, error = %e, "Liveness unknown; reloading anyway");
                    Some(id)
                }
            },
            None => None,
        };
        let Some(id) = live else {
            self.recreate(index, "missing").await;
            return false;
        };

        tracing::warn!(index = %index, surface = %id, "Reload viewer window");
        match self.host.reload_surface(id, true).await {
            Ok(()) => {
                metrics::record_reload("ok");
                true
            }
            Err(e) => {
                metrics::record_reload("failed");
                tracing::warn!(index = %index, error = %e, "Reload failed");
                self.recreate(index, "reload-failed").await;
                false
            }
        }
    }

    /// Destroy and rebuild the surface of a session.
    ///
    /// The slot is left empty when there is no display configuration or the
    /// index is outside the configured screen count.
    pub async fn recreate(&self, index: SessionIndex, reason: &str) -> Option<SurfaceId> {
        if self.shutdown.is_quitting() {
            return None;
        }
        let Some(_guard) = self.registry.begin_recreate(index) else {
            tracing::debug!(index = %index, reason = %reason, "Recreate already in progress");
            return None;
        };

        if let Some(old) = self.registry.remove(index) {
            if let Err(e) = self.host.destroy_surface(old).await {
                tracing::debug!(index = %index, surface = %old, error = %e, "Destroy failed");
            }
        }
        self.backoff.forget(index);
        self.drift.forget(index);

        tracing::warn!(index = %index, reason = %reason, "Recreate viewer window");
        metrics::record_recreate(reason);

        let config = self.config.load_full();
        let display = config.display.as_ref()?;
        let count = display.screen_count();
        if index.get() >= count {
            return None;
        }

        let (title, maximize) = session_layout(count, display.screen(index.get()).maximize, index);
        match self.create_session(index, None, false, title, maximize).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(index = %index, error = %e, "Recreate failed");
                None
            }
        }
    }

    /// Merge a heartbeat from the content instrumentation.
    pub fn handle_heartbeat(&self, heartbeat: &Heartbeat) -> HealthRecord {
        self.health.record_heartbeat(heartbeat, self.clock.now_ms())
    }

    /// Dispatch one surface signal. Only navigation signals can yield
    /// [`NavigationVerdict::Prevent`].
    pub async fn handle_surface_event(&self, event: SurfaceEvent) -> NavigationVerdict {
        let SurfaceEvent { index, surface, signal } = event;

        if !self.registry.is_current(index, surface) {
            tracing::debug!(index = %index, surface = %surface, signal = signal.kind(), "Dropping signal from stale surface");
            return NavigationVerdict::Allow;
        }

        match signal {
            SurfaceSignal::Unresponsive => {
                if !self.shutdown.is_quitting() {
                    self.escalator.note_recovery(index, "unresponsive");
                    self.reload(index).await;
                }
            }
            SurfaceSignal::RendererGone { reason, exit_code } => {
                if !self.shutdown.is_quitting() {
                    self.escalator.note_recovery(index, "render_process_gone");
                    tracing::warn!(index = %index, reason = %reason, exit_code = ?exit_code, "Render process gone");
                    self.recreate(index, "render-gone").await;
                }
            }
            SurfaceSignal::Closed => {
                self.registry.remove_if_current(index, surface);
                if !self.shutdown.is_quitting() {
                    self.escalator.note_recovery(index, "closed");
                    self.recreate(index, "closed").await;
                }
            }
            SurfaceSignal::LoadFailed { error_code, description, url, is_main_frame } => {
                self.on_load_failed(index, surface, error_code, &description, &url, is_main_frame)
                    .await;
            }
            SurfaceSignal::LoadFinished { url } => {
                self.backoff.note_load_finished(index, surface, &url);
            }
            SurfaceSignal::WillNavigate { url } => {
                return self.drift.on_preventable(index, surface, &url, NavigationTrigger::WillNavigate);
            }
            SurfaceSignal::WillRedirect { url } => {
                return self.drift.on_preventable(index, surface, &url, NavigationTrigger::WillRedirect);
            }
            SurfaceSignal::DidNavigateInPage { url, is_main_frame } => {
                self.drift.on_in_page(index, surface, &url, is_main_frame);
            }
        }

        NavigationVerdict::Allow
    }

    async fn on_load_failed(
        &self,
        index: SessionIndex,
        surface: SurfaceId,
        code: i32,
        description: &str,
        url: &str,
        is_main_frame: bool,
    ) {
        if !is_main_frame || self.shutdown.is_quitting() {
            return;
        }

        let now = self.clock.now_ms();
        let (log_due, fix_due) = {
            let mut throttle = self.fail_throttle.entry(index).or_insert(FailThrottle {
                surface,
                last_log_at: 0,
                last_fix_at: 0,
            });
            if throttle.surface != surface {
                *throttle = FailThrottle { surface, last_log_at: 0, last_fix_at: 0 };
            }

            let log_due = now.saturating_sub(throttle.last_log_at) > FAIL_LOG_THROTTLE_MS;
            if log_due {
                throttle.last_log_at = now;
            }
            (log_due, throttle.last_fix_at)
        };

        if log_due {
            tracing::warn!(index = %index, error_code = code, error_description = %description, url = %url, "did-fail-load");
        }

        match classify_code(code, description) {
            FailureClass::Aborted => {}
            FailureClass::Network => {
                self.backoff.on_load_failure(index, surface, code, description);
            }
            FailureClass::Other => {
                if fix_due != 0 && now.saturating_sub(fix_due) < FAIL_FIX_THROTTLE_MS {
                    return;
                }
                if let Some(mut throttle) = self.fail_throttle.get_mut(&index) {
                    throttle.last_fix_at = now;
                }

                self.escalator.note_recovery(index, "did_fail_load");
                tokio::time::sleep(FAIL_RELOAD_DELAY).await;
                self.reload(index).await;
            }
        }
    }
}

/// Title suffix and maximize hint of a session.
fn session_layout(count: usize, maximize: bool, index: SessionIndex) -> (String, bool) {
    let title = if count > 1 {
        format!("Screen {}", index.get() + 1)
    } else {
        String::new()
    };
    (title, maximize)
}
