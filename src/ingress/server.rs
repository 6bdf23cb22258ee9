//! Signal ingress HTTP server.
//!
//! # Responsibilities
//! - Accept heartbeats and diagnostic events from the content instrumentation
//! - Accept surface signals from the display host and answer preventable
//!   navigations with a verdict
//! - Wire up middleware (tracing, body limit, timeout, request ID)
//!
//! # Routes
//! ```text
//! POST /signals/heartbeat   Heartbeat      → 204
//! POST /signals/event       ViewerEvent    → 204
//! POST /signals/surface     SurfaceEvent   → { "verdict": "allow" | "prevent" }
//! GET  /healthz                            → "ok"
//! ```
//!
//! # Design Decisions
//! - Preventable signals are handled inline because the host waits for the
//!   verdict; every other signal is handled on a spawned task so a slow
//!   recreate never blocks the host's request
//! - Shuts down gracefully on the shared shutdown broadcast

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::IngressConfig;
use crate::health::Heartbeat;
use crate::ingress::diagnostics::{DiagnosticsLog, ViewerEvent};
use crate::lifecycle::Shutdown;
use crate::navigation::NavigationVerdict;
use crate::supervisor::{SurfaceEvent, Supervisor};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// State shared by ingress handlers.
#[derive(Clone)]
pub struct IngressState {
    pub supervisor: Supervisor,
    pub diagnostics: DiagnosticsLog,
}

/// Verdict returned for a surface signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictResponse {
    pub verdict: NavigationVerdict,
}

/// Sequential `x-request-id` values.
#[derive(Debug, Clone, Default)]
struct SequentialRequestId {
    next: Arc<AtomicU64>,
}

impl MakeRequestId for SequentialRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        HeaderValue::from_str(&format!("ingress-{id}")).ok().map(RequestId::new)
    }
}

/// HTTP server for inbound signals.
pub struct IngressServer {
    router: Router,
    config: IngressConfig,
}

impl IngressServer {
    pub fn new(supervisor: Supervisor, config: IngressConfig) -> Self {
        let diagnostics = DiagnosticsLog::new(supervisor.clock().clone());
        let state = IngressState { supervisor, diagnostics };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &IngressConfig, state: IngressState) -> Router {
        Router::new()
            .route("/signals/heartbeat", post(heartbeat_handler))
            .route("/signals/event", post(event_handler))
            .route("/signals/surface", post(surface_handler))
            .route("/healthz", get(|| async { "ok" }))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(SetRequestIdLayer::x_request_id(SequentialRequestId::default()))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, IngressError> {
        let address: SocketAddr = self
            .config
            .bind_address
            .parse()
            .map_err(|_| IngressError::InvalidAddress(self.config.bind_address.clone()))?;
        TcpListener::bind(address)
            .await
            .map_err(|source| IngressError::Bind { address, source })
    }

    /// Serve on `listener` until shutdown is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), IngressError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Ingress server starting");

        let mut rx = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                if !shutdown.is_quitting() {
                    let _ = rx.recv().await;
                }
            })
            .await?;

        tracing::info!("Ingress server stopped");
        Ok(())
    }
}

async fn heartbeat_handler(State(state): State<IngressState>, Json(heartbeat): Json<Heartbeat>) -> StatusCode {
    state.supervisor.handle_heartbeat(&heartbeat);
    StatusCode::NO_CONTENT
}

async fn event_handler(State(state): State<IngressState>, Json(event): Json<ViewerEvent>) -> StatusCode {
    state.diagnostics.record(&event);
    StatusCode::NO_CONTENT
}

async fn surface_handler(State(state): State<IngressState>, Json(event): Json<SurfaceEvent>) -> Json<VerdictResponse> {
    tracing::debug!(index = %event.index, surface = %event.surface, signal = event.signal.kind(), "Surface signal");

    if event.signal.is_preventable() {
        let verdict = state.supervisor.handle_surface_event(event).await;
        return Json(VerdictResponse { verdict });
    }

    let supervisor = state.supervisor.clone();
    tokio::spawn(async move {
        supervisor.handle_surface_event(event).await;
    });
    Json(VerdictResponse {
        verdict: NavigationVerdict::Allow,
    })
}
