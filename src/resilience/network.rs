//! Network failure backoff controller.
//!
//! # Responsibilities
//! - Show the offline page with diagnostic context, throttled per session
//! - Schedule at most one retry per session, pending or in flight
//! - Reset the attempt counter when the surface changes or the desired
//!   origin loads cleanly
//!
//! # Data Flow
//! ```text
//! LoadFailed(network code)
//!     → on_load_failure()
//!         → offline page load (spawned, throttled)
//!         → retry timer (spawned) → fire_retry() → host.load_url(desired)
//!
//! LoadFinished(desired origin)
//!     → note_load_finished() → attempt counter reset
//! ```
//!
//! # Design Decisions
//! - Retry state is keyed by session index and tagged with the surface it
//!   belongs to; a new surface starts from a fresh state
//! - A failed retry is counted by the host's load-failure signal, never by
//!   the retry itself; if that signal lands while the retry is in flight,
//!   the retry schedules the follow-up once the load settles

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use url::Url;

use crate::clock::SharedClock;
use crate::config::SharedConfig;
use crate::health::SessionIndex;
use crate::lifecycle::Shutdown;
use crate::navigation::Destinations;
use crate::observability::metrics;
use crate::resilience::backoff::retry_delay;
use crate::resilience::classify::{classify, classify_code, FailureClass};
use crate::surface::{LoadOptions, SessionRegistry, SharedHost, SurfaceId};

/// Transient retry state of one session's surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryState {
    pub surface: Option<SurfaceId>,
    pub net_fail_count: u32,
    pub retry_pending: bool,
    pub retry_in_flight: bool,
    /// Epoch ms the offline page was last shown, 0 if never.
    pub last_offline_at: u64,
    /// Epoch ms a retry was last logged, 0 if never.
    pub last_log_at: u64,
}

impl RetryState {
    fn for_surface(surface: SurfaceId) -> Self {
        Self {
            surface: Some(surface),
            ..Self::default()
        }
    }
}

/// What `show_offline_and_retry` did.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureOutcome {
    pub attempt: u32,
    pub offline_shown: bool,
    /// Delay of the newly scheduled retry, `None` when one was already
    /// pending or in flight.
    pub retry_in: Option<Duration>,
}

/// Per-session retry scheduler for transport failures.
#[derive(Clone)]
pub struct NetworkBackoff {
    config: SharedConfig,
    clock: SharedClock,
    host: SharedHost,
    registry: SessionRegistry,
    destinations: Destinations,
    shutdown: Shutdown,
    states: Arc<DashMap<SessionIndex, RetryState>>,
}

impl NetworkBackoff {
    pub fn new(
        config: SharedConfig,
        clock: SharedClock,
        host: SharedHost,
        registry: SessionRegistry,
        destinations: Destinations,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            clock,
            host,
            registry,
            destinations,
            shutdown,
            states: Arc::new(DashMap::new()),
        }
    }

    /// Handle a failed load reported for `surface`.
    ///
    /// Only network-classified failures are handled; aborted and other
    /// failures return `None` and leave the attempt counter alone.
    pub fn on_load_failure(
        &self,
        index: SessionIndex,
        surface: SurfaceId,
        code: i32,
        description: &str,
    ) -> Option<FailureOutcome> {
        if classify_code(code, description) != FailureClass::Network {
            return None;
        }
        self.show_offline_and_retry(index, surface, code, description)
    }

    /// Show the offline page and schedule a retry, without classifying.
    ///
    /// Used directly when the initial load fails before the surface ever
    /// reached an http(s) page.
    pub fn show_offline_and_retry(
        &self,
        index: SessionIndex,
        surface: SurfaceId,
        code: i32,
        description: &str,
    ) -> Option<FailureOutcome> {
        if self.shutdown.is_quitting() {
            return None;
        }

        let config = self.config.load();
        let backoff = &config.backoff;
        let now = self.clock.now_ms();
        let desired = self.destinations.desired_url(index);

        let mut state = self
            .states
            .entry(index)
            .or_insert_with(|| RetryState::for_surface(surface));
        if state.surface != Some(surface) {
            *state = RetryState::for_surface(surface);
        }

        state.net_fail_count = state.net_fail_count.saturating_add(1);
        let attempt = state.net_fail_count;

        let offline_shown = now.saturating_sub(state.last_offline_at) > backoff.offline_throttle_ms;
        if offline_shown {
            state.last_offline_at = now;
        }

        let retry_in = if state.retry_pending || state.retry_in_flight {
            None
        } else {
            state.retry_pending = true;
            Some(retry_delay(attempt, backoff))
        };

        let log_due = retry_in.is_some() && now.saturating_sub(state.last_log_at) > backoff.log_throttle_ms;
        if log_due {
            state.last_log_at = now;
        }
        drop(state);

        if offline_shown {
            match offline_url(&config.host.offline_page, index, desired.as_deref(), code, description, attempt) {
                Some(url) => {
                    let host = self.host.clone();
                    tokio::spawn(async move {
                        if let Err(e) = host.load_url(surface, &url, &LoadOptions::default()).await {
                            tracing::debug!(index = %index, error = %e, "Offline page load failed");
                        }
                    });
                }
                None => {
                    tracing::debug!(
                        offline_page = %config.host.offline_page,
                        "Offline page is not a valid URL"
                    );
                }
            }
        }

        if let Some(delay) = retry_in {
            if log_due {
                tracing::warn!(
                    index = %index,
                    error_code = code,
                    error_description = %description,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Network load failed; retry scheduled"
                );
            }

            self.spawn_retry(index, surface, delay);
        }

        Some(FailureOutcome {
            attempt,
            offline_shown,
            retry_in,
        })
    }

    async fn fire_retry(&self, index: SessionIndex, surface: SurfaceId) {
        self.update(index, surface, |s| s.retry_pending = false);

        if self.shutdown.is_quitting() {
            return;
        }
        let Some(desired) = self.destinations.desired_url(index) else {
            return;
        };
        let alive = self.registry.is_current(index, surface)
            && !matches!(self.host.surface_exists(surface).await, Ok(false));
        if !alive {
            tracing::debug!(index = %index, surface = %surface, "Retry target gone");
            return;
        }

        let options = LoadOptions {
            user_agent: Some(self.config.load().host.user_agent.clone()),
        };

        let attempt_before = self.state(index).map(|s| s.net_fail_count).unwrap_or(0);
        self.update(index, surface, |s| s.retry_in_flight = true);
        metrics::record_network_retry();
        let result = self.host.load_url(surface, &desired, &options).await;
        self.update(index, surface, |s| s.retry_in_flight = false);

        let Err(e) = result else {
            return;
        };
        tracing::debug!(index = %index, error = %e, "Retry load failed");
        if classify(&e) != FailureClass::Network || self.shutdown.is_quitting() {
            return;
        }

        // The failure signal for this load already arrived while it was in
        // flight and could not schedule anything.
        let delay = {
            let Some(mut state) = self.states.get_mut(&index) else {
                return;
            };
            if state.surface != Some(surface) || state.retry_pending || state.net_fail_count <= attempt_before {
                return;
            }
            state.retry_pending = true;
            retry_delay(state.net_fail_count, &self.config.load().backoff)
        };
        self.spawn_retry(index, surface, delay);
    }

    fn spawn_retry(&self, index: SessionIndex, surface: SurfaceId, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire_retry(index, surface).await;
        });
    }

    /// Reset the attempt counter once `current_url` is on the desired origin.
    pub fn note_load_finished(&self, index: SessionIndex, surface: SurfaceId, current_url: &str) -> bool {
        let Some(origin) = self.destinations.desired_origin(index) else {
            return false;
        };
        if !current_url.starts_with(&origin) {
            return false;
        }

        self.update(index, surface, |s| {
            s.net_fail_count = 0;
            s.last_log_at = 0;
        })
    }

    /// Drop all retry state of `index`.
    pub fn forget(&self, index: SessionIndex) {
        self.states.remove(&index);
    }

    pub fn is_retry_pending(&self, index: SessionIndex) -> bool {
        self.states
            .get(&index)
            .map(|s| s.retry_pending || s.retry_in_flight)
            .unwrap_or(false)
    }

    pub fn state(&self, index: SessionIndex) -> Option<RetryState> {
        self.states.get(&index).map(|s| s.value().clone())
    }

    /// Mutate the state of `index` only while it still belongs to `surface`.
    fn update(&self, index: SessionIndex, surface: SurfaceId, f: impl FnOnce(&mut RetryState)) -> bool {
        match self.states.get_mut(&index) {
            Some(mut state) if state.surface == Some(surface) => {
                f(&mut state);
                true
            }
            _ => false,
        }
    }
}

/// Offline page URL carrying the failure context as query parameters.
pub fn offline_url(
    base: &str,
    index: SessionIndex,
    desired: Option<&str>,
    code: i32,
    description: &str,
    attempt: u32,
) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.query_pairs_mut()
        .clear()
        .append_pair("screen", &index.to_string())
        .append_pair("url", desired.unwrap_or_default())
        .append_pair("errorCode", &code.to_string())
        .append_pair("errorDescription", description)
        .append_pair("attempt", &attempt.to_string());
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{self, DisplayConfig, KioskConfig};
    use crate::surface::{HeadlessHost, HostError, LoadError, SurfaceHost, SurfaceSpec};
    use async_trait::async_trait;

    const DESIRED: &str = "https://nvr.local/protect/dashboard/abc";

    /// Headless host whose loads settle one second after they start.
    struct SlowLoads(HeadlessHost);

    #[async_trait]
    impl SurfaceHost for SlowLoads {
        async fn create_surface(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
            self.0.create_surface(spec).await
        }

        async fn destroy_surface(&self, id: SurfaceId) -> Result<(), HostError> {
            self.0.destroy_surface(id).await
        }

        async fn surface_exists(&self, id: SurfaceId) -> Result<bool, HostError> {
            self.0.surface_exists(id).await
        }

        async fn reload_surface(&self, id: SurfaceId, bypass_cache: bool) -> Result<(), HostError> {
            self.0.reload_surface(id, bypass_cache).await
        }

        async fn load_url(&self, id: SurfaceId, url: &str, options: &LoadOptions) -> Result<(), LoadError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.0.load_url(id, url, options).await
        }

        async fn current_url(&self, id: SurfaceId) -> Result<String, HostError> {
            self.0.current_url(id).await
        }

        async fn rewrite_history(&self, id: SurfaceId, url: &str) -> Result<(), HostError> {
            self.0.rewrite_history(id, url).await
        }
    }

    struct Fixture {
        backoff: NetworkBackoff,
        host: HeadlessHost,
        clock: ManualClock,
        shutdown: Shutdown,
        surface: SurfaceId,
        index: SessionIndex,
    }

    async fn fixture() -> Fixture {
        fixture_with_host(|host| Arc::new(host)).await
    }

    async fn fixture_with_host(wrap: impl FnOnce(HeadlessHost) -> SharedHost) -> Fixture {
        let mut kiosk = KioskConfig::default();
        kiosk.display = Some(DisplayConfig {
            url: DESIRED.into(),
            screens: 1,
            screens_config: Vec::new(),
        });
        let config = config::shared(kiosk);
        let clock = ManualClock::new(1_000_000);
        let host = HeadlessHost::new();
        let registry = SessionRegistry::new();
        let shutdown = Shutdown::new();
        let index = SessionIndex::new(0).unwrap();

        let surface = host
            .create_surface(&SurfaceSpec {
                index,
                destination: None,
                allow_config_fallback: false,
                title_suffix: String::new(),
                maximize_hint: false,
            })
            .await
            .unwrap();
        registry.insert(index, surface);

        let backoff = NetworkBackoff::new(
            config.clone(),
            Arc::new(clock.clone()),
            wrap(host.clone()),
            registry,
            Destinations::new(config),
            shutdown.clone(),
        );

        Fixture { backoff, host, clock, shutdown, surface, index }
    }

    #[test]
    fn test_offline_url_carries_context() {
        let url = offline_url(
            "file:///usr/share/kiosk/offline.html",
            SessionIndex::new(2).unwrap(),
            Some("https://nvr.local/a?b=c"),
            -105,
            "ERR_NAME_NOT_RESOLVED",
            3,
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("screen".into(), "2".into()));
        assert_eq!(pairs[1], ("url".into(), "https://nvr.local/a?b=c".into()));
        assert_eq!(pairs[2], ("errorCode".into(), "-105".into()));
        assert_eq!(pairs[4], ("attempt".into(), "3".into()));
        assert!(offline_url("not a url", SessionIndex::new(0).unwrap(), None, 0, "", 1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_schedule_one_retry() {
        let f = fixture().await;

        let first = f.backoff.on_load_failure(f.index, f.surface, -102, "ERR_CONNECTION_REFUSED").unwrap();
        assert_eq!(first.attempt, 1);
        assert!(first.offline_shown);
        assert_eq!(first.retry_in, Some(Duration::from_millis(15_000)));

        f.clock.advance(Duration::from_millis(1_000));
        let second = f.backoff.on_load_failure(f.index, f.surface, -102, "ERR_CONNECTION_REFUSED").unwrap();
        assert_eq!(second.attempt, 2);
        assert!(!second.offline_shown);
        assert_eq!(second.retry_in, None);
        assert!(f.backoff.is_retry_pending(f.index));

        tokio::time::sleep(Duration::from_millis(15_100)).await;
        assert_eq!(f.host.load_count(DESIRED), 1);
        assert!(!f.backoff.is_retry_pending(f.index));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_and_other_failures_are_ignored() {
        let f = fixture().await;

        assert!(f.backoff.on_load_failure(f.index, f.surface, -3, "ERR_ABORTED").is_none());
        assert!(f.backoff.on_load_failure(f.index, f.surface, -324, "ERR_EMPTY_RESPONSE").is_none());
        assert!(f.backoff.state(f.index).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_retry_is_counted_once() {
        let f = fixture().await;
        f.host.fail_loads(Some(LoadError::from_failure(-106, "ERR_INTERNET_DISCONNECTED")));

        f.backoff.on_load_failure(f.index, f.surface, -106, "ERR_INTERNET_DISCONNECTED");
        tokio::time::sleep(Duration::from_millis(15_100)).await;

        // the retry's own rejection does not advance the counter
        let state = f.backoff.state(f.index).unwrap();
        assert_eq!(f.host.load_count(DESIRED), 1);
        assert_eq!(state.net_fail_count, 1);
        assert!(!state.retry_pending);

        // the host then reports the same failure
        f.clock.advance(Duration::from_millis(15_100));
        let outcome = f.backoff.on_load_failure(f.index, f.surface, -106, "ERR_INTERNET_DISCONNECTED").unwrap();
        assert_eq!(outcome.attempt, 2);
        assert_eq!(outcome.retry_in, Some(Duration::from_millis(15_000)));
        assert_eq!(f.backoff.state(f.index).unwrap().net_fail_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reported_during_retry_schedules_next_retry() {
        let f = fixture_with_host(|host| Arc::new(SlowLoads(host))).await;
        f.host.fail_loads(Some(LoadError::from_failure(-106, "ERR_INTERNET_DISCONNECTED")));

        f.backoff.on_load_failure(f.index, f.surface, -106, "ERR_INTERNET_DISCONNECTED");
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        assert!(f.backoff.state(f.index).unwrap().retry_in_flight);

        // the host reports the failure before the load call returns
        f.clock.advance(Duration::from_millis(15_500));
        let outcome = f.backoff.on_load_failure(f.index, f.surface, -106, "ERR_INTERNET_DISCONNECTED").unwrap();
        assert_eq!(outcome.attempt, 2);
        assert_eq!(outcome.retry_in, None);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let state = f.backoff.state(f.index).unwrap();
        assert_eq!(state.net_fail_count, 2);
        assert!(!state.retry_in_flight);
        assert!(state.retry_pending);

        tokio::time::sleep(Duration::from_millis(16_500)).await;
        assert_eq!(f.host.load_count(DESIRED), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_aborts_when_quitting_or_surface_gone() {
        let f = fixture().await;
        f.backoff.on_load_failure(f.index, f.surface, -105, "ERR_NAME_NOT_RESOLVED");
        f.shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(16_000)).await;
        assert_eq!(f.host.load_count(DESIRED), 0);

        let g = fixture().await;
        g.backoff.on_load_failure(g.index, g.surface, -105, "ERR_NAME_NOT_RESOLVED");
        g.host.vanish(g.surface);
        tokio::time::sleep(Duration::from_millis(16_000)).await;
        assert_eq!(g.host.load_count(DESIRED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_resets_on_desired_origin_and_new_surface() {
        let f = fixture().await;
        f.backoff.on_load_failure(f.index, f.surface, -7, "ERR_TIMED_OUT");
        assert_eq!(f.backoff.state(f.index).unwrap().net_fail_count, 1);

        assert!(!f.backoff.note_load_finished(f.index, f.surface, "https://elsewhere.local/"));
        assert!(f.backoff.note_load_finished(f.index, f.surface, "https://nvr.local/protect/x"));
        assert_eq!(f.backoff.state(f.index).unwrap().net_fail_count, 0);

        let outcome = f.backoff.on_load_failure(f.index, SurfaceId(99), -7, "ERR_TIMED_OUT").unwrap();
        assert_eq!(outcome.attempt, 1);
        assert_eq!(f.backoff.state(f.index).unwrap().surface, Some(SurfaceId(99)));
    }
}
