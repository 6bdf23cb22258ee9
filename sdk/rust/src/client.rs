//! Client for the kiosk supervisor's signal ingress.
//!
//! Used by content instrumentation and display hosts written in Rust, and by
//! the supervisor's own integration tests.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub count: u32,
    pub any_playing: bool,
    pub max_current_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub screen_index: u8,
    pub href: String,
    pub video: VideoSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub screen_index: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfacePayload {
    pub index: u8,
    pub surface: u64,
    /// Tagged signal, e.g. `{"type": "will_redirect", "url": "..."}`.
    pub signal: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub verdict: String,
}

pub struct KioskClient {
    client: Client,
    ingress_url: String,
}

impl KioskClient {
    pub fn new(ingress_url: &str) -> Self {
        Self {
            client: Client::new(),
            ingress_url: ingress_url.trim_end_matches('/').to_string(),
        }
    }

    /// Post a heartbeat. Returns the HTTP status.
    pub async fn heartbeat(&self, payload: &HeartbeatPayload) -> Result<StatusCode, reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}/signals/heartbeat", self.ingress_url))
            .json(payload)
            .send()
            .await?;
        Ok(resp.status())
    }

    /// Post a diagnostic event. Returns the HTTP status.
    pub async fn event(&self, payload: &EventPayload) -> Result<StatusCode, reqwest::Error> {
        let resp = self
            .client
            .post(format!("{}/signals/event", self.ingress_url))
            .json(payload)
            .send()
            .await?;
        Ok(resp.status())
    }

    /// Post a surface signal and return the supervisor's verdict.
    pub async fn surface_signal(&self, payload: &SurfacePayload) -> Result<VerdictResponse, Box<dyn std::error::Error>> {
        let resp = self
            .client
            .post(format!("{}/signals/surface", self.ingress_url))
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Ingress returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str::<VerdictResponse>(&text)?)
    }
}
