//! Desired destination per session.
//!
//! Resolution order: explicit override for the session, else the per-screen
//! URL, else the global URL.

use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::config::SharedConfig;
use crate::health::SessionIndex;

/// Resolves where each session is supposed to be.
#[derive(Debug, Clone)]
pub struct Destinations {
    config: SharedConfig,
    overrides: Arc<DashMap<SessionIndex, String>>,
}

impl Destinations {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            overrides: Arc::new(DashMap::new()),
        }
    }

    /// Set or clear the explicit destination of `index`.
    pub fn set_override(&self, index: SessionIndex, url: Option<String>) {
        match url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            Some(url) => {
                self.overrides.insert(index, url);
            }
            None => {
                self.overrides.remove(&index);
            }
        }
    }

    /// Desired URL of `index`, if any is configured.
    pub fn desired_url(&self, index: SessionIndex) -> Option<String> {
        if let Some(url) = self.overrides.get(&index) {
            return Some(url.value().clone());
        }

        let config = self.config.load();
        let url = config.display.as_ref()?.url_for(index.get());
        (!url.is_empty()).then_some(url)
    }

    /// Desired URL together with its normalized path, when both are usable.
    pub fn desired_with_path(&self, index: SessionIndex) -> Option<(String, String)> {
        let url = self.desired_url(index)?;
        let path = normalize_path(&url);
        (!path.is_empty()).then_some((url, path))
    }

    /// Origin (`scheme://host[:port]`) of the desired URL.
    pub fn desired_origin(&self, index: SessionIndex) -> Option<String> {
        let url = Url::parse(&self.desired_url(index)?).ok()?;
        let origin = url.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

/// Path of `url` without trailing slashes, or empty when unparseable.
pub fn normalize_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().trim_end_matches('/').to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, DisplayConfig, KioskConfig, ScreenConfig};

    fn destinations() -> Destinations {
        let mut kiosk = KioskConfig::default();
        kiosk.display = Some(DisplayConfig {
            url: "https://nvr.local:7443/protect/dashboard/global".into(),
            screens: 2,
            screens_config: vec![
                ScreenConfig::default(),
                ScreenConfig { url: Some("https://nvr.local/protect/dashboard/two/".into()), maximize: false },
            ],
        });
        Destinations::new(config::shared(kiosk))
    }

    fn index(i: usize) -> SessionIndex {
        SessionIndex::new(i).unwrap()
    }

    #[test]
    fn test_resolution_order() {
        let d = destinations();
        assert_eq!(d.desired_url(index(0)).unwrap(), "https://nvr.local:7443/protect/dashboard/global");
        assert_eq!(d.desired_url(index(1)).unwrap(), "https://nvr.local/protect/dashboard/two/");

        d.set_override(index(1), Some("https://other.local/view".into()));
        assert_eq!(d.desired_url(index(1)).unwrap(), "https://other.local/view");

        d.set_override(index(1), None);
        assert_eq!(d.desired_with_path(index(1)).unwrap().1, "/protect/dashboard/two");
    }

    #[test]
    fn test_origin_and_unconfigured() {
        let d = destinations();
        assert_eq!(d.desired_origin(index(0)).unwrap(), "https://nvr.local:7443");

        let empty = Destinations::new(config::shared(KioskConfig::default()));
        assert!(empty.desired_url(index(0)).is_none());
        assert!(empty.desired_origin(index(0)).is_none());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("https://nvr.local/protect/dashboard/all///"), "/protect/dashboard/all");
        assert_eq!(normalize_path("https://nvr.local/"), "");
        assert_eq!(normalize_path("not a url"), "");
    }
}
