//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the kiosk
//! supervisor. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Upper bound on managed display sessions.
pub const MAX_SCREENS: usize = 6;

/// Root configuration for the kiosk supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KioskConfig {
    /// What to display. `None` means the kiosk has not been configured yet.
    pub display: Option<DisplayConfig>,

    /// Watchdog tick and liveness thresholds.
    pub watchdog: WatchdogConfig,

    /// Recovery escalation policy.
    pub escalation: EscalationConfig,

    /// Network failure retry policy.
    pub backoff: BackoffConfig,

    /// Navigation drift guard settings.
    pub navigation: NavigationConfig,

    /// Window-lifecycle host connection.
    pub host: HostConfig,

    /// Signal ingress listener.
    pub ingress: IngressConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub state: StateConfig,
}

/// Destinations shown by the kiosk.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DisplayConfig {
    /// Global destination URL.
    #[serde(default)]
    pub url: String,

    /// Requested number of sessions (clamped to 1..=6 when read).
    #[serde(default = "default_screens")]
    pub screens: usize,

    /// Per-screen overrides, indexed by session.
    #[serde(default)]
    pub screens_config: Vec<ScreenConfig>,
}

fn default_screens() -> usize {
    1
}

impl DisplayConfig {
    /// Number of sessions to manage, always within 1..=MAX_SCREENS.
    pub fn screen_count(&self) -> usize {
        self.screens.clamp(1, MAX_SCREENS)
    }

    /// Per-screen settings for `index`, or empty defaults.
    pub fn screen(&self, index: usize) -> ScreenConfig {
        self.screens_config.get(index).cloned().unwrap_or_default()
    }

    /// Per-screen URL if set, else the global URL. Empty when neither is set.
    pub fn url_for(&self, index: usize) -> String {
        let per_screen = self
            .screens_config
            .get(index)
            .and_then(|s| s.url.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty());

        per_screen.unwrap_or(self.url.trim()).to_string()
    }
}

/// Per-screen settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ScreenConfig {
    pub url: Option<String>,
    pub maximize: bool,
}

/// Watchdog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// How often every session is re-evaluated.
    pub tick_interval_ms: u64,

    /// A session with no heartbeat for this long is reloaded.
    pub health_timeout_ms: u64,

    /// A playing session with no playback progress for this long is reloaded.
    pub stall_timeout_ms: u64,

    /// Minimum spacing between recovery actions on one session.
    pub recover_cooldown_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 15_000,
            health_timeout_ms: 45_000,
            stall_timeout_ms: 120_000,
            recover_cooldown_ms: 30_000,
        }
    }
}

/// Escalation from per-session recovery to a process relaunch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Sliding window over which recoveries are counted.
    pub recovery_window_ms: u64,

    /// Recoveries inside the window that trigger a relaunch.
    pub hard_restart_threshold: usize,

    /// Minimum time between two relaunches, persisted across restarts.
    pub hard_restart_cooldown_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            recovery_window_ms: 10 * 60_000,
            hard_restart_threshold: 5,
            hard_restart_cooldown_ms: 15 * 60_000,
        }
    }
}

/// Network failure backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Base delay multiplied by 2^attempt.
    pub base_delay_ms: u64,

    /// Exponent cap.
    pub max_exponent: u32,

    /// Lower clamp on the retry delay.
    pub min_delay_ms: u64,

    /// Upper clamp on the retry delay.
    pub max_delay_ms: u64,

    /// Minimum spacing between two offline page loads.
    pub offline_throttle_ms: u64,

    /// Minimum spacing between two "retry scheduled" log lines.
    pub log_throttle_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 2_000,
            max_exponent: 5,
            min_delay_ms: 15_000,
            max_delay_ms: 60_000,
            offline_throttle_ms: 3_000,
            log_throttle_ms: 10_000,
        }
    }
}

/// Navigation drift guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Generic landing paths the content drifts to.
    pub drift_paths: Vec<String>,

    /// At most one correction per session within this window.
    pub correction_throttle_ms: u64,

    /// Delay before checking that a soft correction stuck.
    pub recheck_delay_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            drift_paths: vec![
                "/protect/dashboard/all".to_string(),
                "/protect/dashboard".to_string(),
            ],
            correction_throttle_ms: 1_500,
            recheck_delay_ms: 250,
        }
    }
}

/// Which surface host implementation to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Talk to a display host over HTTP.
    Remote,
    /// Keep surfaces in memory (dry run).
    Headless,
}

/// Window-lifecycle host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    pub mode: HostMode,

    /// Base URL of the host control API.
    pub control_url: String,

    /// User agent for every destination load.
    pub user_agent: String,

    /// Fallback page shown while the network is down.
    pub offline_page: String,

    /// Per-request timeout against the host.
    pub request_timeout_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            mode: HostMode::Remote,
            control_url: "http://127.0.0.1:7300".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36".to_string(),
            offline_page: "file:///usr/share/kiosk-supervisor/offline.html".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Signal ingress configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Bind address for heartbeat/event/signal intake.
    pub bind_address: String,

    /// Maximum accepted request body.
    pub max_body_bytes: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7310".to_string(),
            max_body_bytes: 64 * 1024,
            request_timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Stdout log format.
    pub log_format: LogFormat,

    /// Directory for a daily rolling log file. Disabled when unset.
    pub log_dir: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_dir: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:7311".to_string(),
        }
    }
}

/// Persisted supervisor state.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// JSON file holding the relaunch guard. In-memory only when unset.
    pub path: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: Some("kiosk-state.json".to_string()),
        }
    }
}
