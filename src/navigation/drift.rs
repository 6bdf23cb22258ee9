//! Navigation drift guard.
//!
//! # Responsibilities
//! - Detect navigations toward a generic landing path that differs from the
//!   session's desired path
//! - Cancel preventable navigations and load the desired URL instead
//! - Soft-correct committed in-page navigations, falling back to a full load
//!
//! # Design Decisions
//! - Preventable drift is always cancelled; only the corrective load is
//!   throttled
//! - One correction per session per throttle window
//! - Reactive only: the health store is never consulted

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::config::SharedConfig;
use crate::health::SessionIndex;
use crate::lifecycle::Shutdown;
use crate::navigation::destination::{normalize_path, Destinations};
use crate::observability::metrics;
use crate::surface::{LoadOptions, SharedHost, SurfaceId};

/// What caused a navigation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTrigger {
    WillNavigate,
    WillRedirect,
    InPage,
}

impl NavigationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationTrigger::WillNavigate => "will-navigate",
            NavigationTrigger::WillRedirect => "will-redirect",
            NavigationTrigger::InPage => "did-navigate-in-page",
        }
    }
}

/// Answer to a preventable navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationVerdict {
    Allow,
    Prevent,
}

/// A detected drift.
#[derive(Debug, Clone, PartialEq)]
pub struct Drift {
    pub desired_url: String,
    pub desired_path: String,
    pub target_path: String,
}

/// Keeps each session on its desired destination.
#[derive(Clone)]
pub struct DriftGuard {
    config: SharedConfig,
    clock: SharedClock,
    host: SharedHost,
    destinations: Destinations,
    shutdown: Shutdown,
    last_fix: Arc<DashMap<SessionIndex, u64>>,
}

impl DriftGuard {
    pub fn new(
        config: SharedConfig,
        clock: SharedClock,
        host: SharedHost,
        destinations: Destinations,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            config,
            clock,
            host,
            destinations,
            shutdown,
            last_fix: Arc::new(DashMap::new()),
        }
    }

    pub fn is_drift_path(&self, path: &str) -> bool {
        self.config.load().navigation.drift_paths.iter().any(|p| p == path)
    }

    /// Drift of `url` away from the desired destination of `index`, if any.
    pub fn detect(&self, index: SessionIndex, url: &str) -> Option<Drift> {
        let (desired_url, desired_path) = self.destinations.desired_with_path(index)?;
        let target_path = normalize_path(url);

        if !self.is_drift_path(&target_path) || target_path == desired_path {
            return None;
        }

        Some(Drift {
            desired_url,
            desired_path,
            target_path,
        })
    }

    /// Claim the correction slot of `index` for the current window.
    fn throttle_ok(&self, index: SessionIndex) -> bool {
        let now = self.clock.now_ms();
        let window = self.config.load().navigation.correction_throttle_ms;

        let mut last = self.last_fix.entry(index).or_insert(0);
        if *last != 0 && now.saturating_sub(*last) < window {
            return false;
        }
        *last = now;
        true
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            user_agent: Some(self.config.load().host.user_agent.clone()),
        }
    }

    /// Judge a navigation or redirect that has not committed yet.
    pub fn on_preventable(
        &self,
        index: SessionIndex,
        surface: SurfaceId,
        url: &str,
        trigger: NavigationTrigger,
    ) -> NavigationVerdict {
        let Some(drift) = self.detect(index, url) else {
            return NavigationVerdict::Allow;
        };

        if self.shutdown.is_quitting() || !self.throttle_ok(index) {
            tracing::debug!(index = %index, trigger = trigger.as_str(), "Drift correction throttled");
            return NavigationVerdict::Prevent;
        }

        tracing::warn!(
            index = %index,
            reason = trigger.as_str(),
            to_path = %drift.target_path,
            desired_path = %drift.desired_path,
            "Dashboard drift prevented"
        );
        metrics::record_drift_correction("prevented");

        let host = self.host.clone();
        let options = self.load_options();
        tokio::spawn(async move {
            if let Err(e) = host.load_url(surface, &drift.desired_url, &options).await {
                tracing::debug!(index = %index, error = %e, "Drift correction load failed");
            }
        });

        NavigationVerdict::Prevent
    }

    /// Handle a committed in-page navigation. Returns true when a soft
    /// correction was started.
    pub fn on_in_page(&self, index: SessionIndex, surface: SurfaceId, url: &str, is_main_frame: bool) -> bool {
        if !is_main_frame || self.shutdown.is_quitting() {
            return false;
        }
        let Some(drift) = self.detect(index, url) else {
            return false;
        };
        if !self.throttle_ok(index) {
            tracing::debug!(index = %index, "Drift correction throttled");
            return false;
        }

        metrics::record_drift_correction("soft");

        let this = self.clone();
        tokio::spawn(async move {
            this.soft_correct(index, surface, drift).await;
        });
        true
    }

    async fn soft_correct(&self, index: SessionIndex, surface: SurfaceId, drift: Drift) {
        let from_path = match self.host.current_url(surface).await {
            Ok(current) => normalize_path(&current),
            Err(_) => String::new(),
        };
        tracing::warn!(
            index = %index,
            reason = NavigationTrigger::InPage.as_str(),
            from_path = %from_path,
            to_path = %drift.target_path,
            desired_path = %drift.desired_path,
            "Dashboard drift"
        );

        if let Err(e) = self.host.rewrite_history(surface, &drift.desired_url).await {
            tracing::debug!(index = %index, error = %e, "History rewrite failed");
        }

        let delay = Duration::from_millis(self.config.load().navigation.recheck_delay_ms);
        tokio::time::sleep(delay).await;

        if self.shutdown.is_quitting() {
            return;
        }
        let Ok(current) = self.host.current_url(surface).await else {
            return;
        };
        if !self.is_drift_path(&normalize_path(&current)) {
            return;
        }

        tracing::warn!(index = %index, path = %normalize_path(&current), "Drift persisted after soft correction; loading");
        metrics::record_drift_correction("reload");
        if let Err(e) = self.host.load_url(surface, &drift.desired_url, &self.load_options()).await {
            tracing::debug!(index = %index, error = %e, "Drift correction load failed");
        }
    }

    /// Drop the throttle stamp of `index`.
    pub fn forget(&self, index: SessionIndex) {
        self.last_fix.remove(&index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{self, DisplayConfig, KioskConfig};
    use crate::surface::{HeadlessHost, HostOp, SurfaceHost, SurfaceSpec};

    const DESIRED: &str = "https://nvr.local/protect/dashboard/abc";
    const DRIFT: &str = "https://nvr.local/protect/dashboard/all";

    async fn guard() -> (DriftGuard, HeadlessHost, ManualClock, SurfaceId, SessionIndex) {
        let mut kiosk = KioskConfig::default();
        kiosk.display = Some(DisplayConfig {
            url: DESIRED.into(),
            screens: 1,
            screens_config: Vec::new(),
        });
        let config = config::shared(kiosk);
        let clock = ManualClock::new(5_000_000);
        let host = HeadlessHost::new();
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

        let guard = DriftGuard::new(
            config.clone(),
            Arc::new(clock.clone()),
            Arc::new(host.clone()),
            Destinations::new(config),
            Shutdown::new(),
        );
        (guard, host, clock, surface, index)
    }

    #[tokio::test]
    async fn test_detection() {
        let (guard, _, _, _, index) = guard().await;

        assert!(guard.detect(index, DRIFT).is_some());
        assert!(guard.detect(index, "https://nvr.local/protect/dashboard/").is_some());
        assert!(guard.detect(index, DESIRED).is_none());
        assert!(guard.detect(index, "https://nvr.local/protect/devices").is_none());
        assert!(guard.detect(index, "garbage").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_correction_per_throttle_window() {
        let (guard, host, clock, surface, index) = guard().await;

        for _ in 0..5 {
            let verdict = guard.on_preventable(index, surface, DRIFT, NavigationTrigger::WillRedirect);
            assert_eq!(verdict, NavigationVerdict::Prevent);
            clock.advance(Duration::from_millis(200));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(host.load_count(DESIRED), 1);

        clock.advance(Duration::from_millis(1_000));
        guard.on_preventable(index, surface, DRIFT, NavigationTrigger::WillNavigate);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(host.load_count(DESIRED), 2);

        assert_eq!(
            guard.on_preventable(index, surface, DESIRED, NavigationTrigger::WillNavigate),
            NavigationVerdict::Allow
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_correction_settles_without_reload() {
        let (guard, host, _, surface, index) = guard().await;
        host.set_url(surface, DRIFT);

        assert!(guard.on_in_page(index, surface, DRIFT, true));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(host.ops().contains(&HostOp::RewriteHistory { id: surface, url: DESIRED.into() }));
        assert_eq!(host.load_count(DESIRED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_correction_falls_back_to_load() {
        let (guard, host, _, surface, index) = guard().await;

        assert!(!guard.on_in_page(index, surface, DRIFT, false));
        assert!(guard.on_in_page(index, surface, DRIFT, true));

        tokio::time::sleep(Duration::from_millis(10)).await;
        host.set_url(surface, DRIFT);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(host.load_count(DESIRED), 1);
    }
}
