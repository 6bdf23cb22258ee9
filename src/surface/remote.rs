//! HTTP client for a remote display host.
//!
//! # Protocol
//! ```text
//! POST   /surfaces                 SurfaceSpec            → { "id": u64 }
//! DELETE /surfaces/{id}
//! GET    /surfaces/{id}                                   → { "url": str } | 404
//! POST   /surfaces/{id}/reload     { "bypass_cache": bool }
//! POST   /surfaces/{id}/load       { "url", "user_agent" } → 2xx | { "error_code", "description" }
//! POST   /surfaces/{id}/history    { "url" }
//! ```
//!
//! # Design Decisions
//! - Every request carries the configured timeout
//! - 404 on a surface route maps to `HostError::UnknownSurface`
//! - A surface only counts as gone on 404; transport errors and other statuses are reported as errors
//! - Load failures keep the platform code so classification happens upstream

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::HostConfig;
use crate::surface::{HostError, LoadError, LoadOptions, SurfaceHost, SurfaceId, SurfaceSpec};

#[derive(Deserialize)]
struct CreatedSurface {
    id: SurfaceId,
}

#[derive(Deserialize)]
struct SurfaceState {
    url: String,
}

#[derive(Deserialize)]
struct LoadFailure {
    error_code: i32,
    #[serde(default)]
    description: String,
}

#[derive(Serialize)]
struct ReloadRequest {
    bypass_cache: bool,
}

#[derive(Serialize)]
struct LoadRequest<'a> {
    url: &'a str,
    user_agent: Option<&'a str>,
}

#[derive(Serialize)]
struct HistoryRequest<'a> {
    url: &'a str,
}

/// Surface host reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteHost {
    client: Client,
    base_url: String,
}

impl RemoteHost {
    pub fn new(config: &HostConfig) -> Result<Self, HostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.control_url.trim_end_matches('/').to_string(),
        })
    }

    fn surface_url(&self, id: SurfaceId, suffix: &str) -> String {
        format!("{}/surfaces/{}{}", self.base_url, id, suffix)
    }

    async fn check(id: Option<SurfaceId>, res: Response) -> Result<Response, HostError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        if let (Some(id), StatusCode::NOT_FOUND) = (id, status) {
            return Err(HostError::UnknownSurface(id));
        }
        let message = res.text().await.unwrap_or_default();
        Err(HostError::Rejected { status: status.as_u16(), message })
    }
}

fn transport(e: reqwest::Error) -> HostError {
    HostError::Transport(e.to_string())
}

#[async_trait]
impl SurfaceHost for RemoteHost {
    async fn create_surface(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
        let res = self
            .client
            .post(format!("{}/surfaces", self.base_url))
            .json(spec)
            .send()
            .await
            .map_err(transport)?;

        let created: CreatedSurface = Self::check(None, res).await?.json().await.map_err(transport)?;
        Ok(created.id)
    }

    async fn destroy_surface(&self, id: SurfaceId) -> Result<(), HostError> {
        let res = self
            .client
            .delete(self.surface_url(id, ""))
            .send()
            .await
            .map_err(transport)?;
        Self::check(Some(id), res).await.map(|_| ())
    }

    async fn surface_exists(&self, id: SurfaceId) -> Result<bool, HostError> {
        let res = self
            .client
            .get(self.surface_url(id, ""))
            .send()
            .await
            .map_err(transport)?;
        match Self::check(Some(id), res).await {
            Ok(_) => Ok(true),
            Err(HostError::UnknownSurface(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn reload_surface(&self, id: SurfaceId, bypass_cache: bool) -> Result<(), HostError> {
        let res = self
            .client
            .post(self.surface_url(id, "/reload"))
            .json(&ReloadRequest { bypass_cache })
            .send()
            .await
            .map_err(transport)?;
        Self::check(Some(id), res).await.map(|_| ())
    }

    async fn load_url(&self, id: SurfaceId, url: &str, options: &LoadOptions) -> Result<(), LoadError> {
        let res = self
            .client
            .post(self.surface_url(id, "/load"))
            .json(&LoadRequest { url, user_agent: options.user_agent.as_deref() })
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(HostError::UnknownSurface(id).into());
        }

        let body = res.text().await.unwrap_or_default();
        match serde_json::from_str::<LoadFailure>(&body) {
            Ok(failure) => Err(LoadError::from_failure(failure.error_code, failure.description)),
            Err(_) => Err(HostError::Rejected { status: status.as_u16(), message: body }.into()),
        }
    }

    async fn current_url(&self, id: SurfaceId) -> Result<String, HostError> {
        let res = self
            .client
            .get(self.surface_url(id, ""))
            .send()
            .await
            .map_err(transport)?;
        let state: SurfaceState = Self::check(Some(id), res).await?.json().await.map_err(transport)?;
        Ok(state.url)
    }

    async fn rewrite_history(&self, id: SurfaceId, url: &str) -> Result<(), HostError> {
        let res = self
            .client
            .post(self.surface_url(id, "/history"))
            .json(&HistoryRequest { url })
            .send()
            .await
            .map_err(transport)?;
        Self::check(Some(id), res).await.map(|_| ())
    }
}
