//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (watchdog, config watcher, signal handler)
//! - Bind listeners before any session exists, so no host signal is lost
//! - Wait for shutdown and let the servers drain
//!
//! # Design Decisions
//! - Fail fast: an unusable host or listener is fatal
//! - A session that fails to come up is not fatal; the watchdog recreates it
//! - Listeners start before sessions are created

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::clock::SystemClock;
use crate::config::watcher::ConfigWatcher;
use crate::config::{self, HostMode, KioskConfig};
use crate::ingress::{IngressError, IngressServer};
use crate::lifecycle::signals::shutdown_on_signal;
use crate::lifecycle::{OsProcess, Shutdown};
use crate::observability::metrics;
use crate::recovery::StateStore;
use crate::supervisor::Supervisor;
use crate::surface::{HeadlessHost, HostError, RemoteHost, SharedHost};
use crate::watchdog::Watchdog;

/// Time the ingress server gets to drain after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("display host unavailable: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Ingress(#[from] IngressError),

    #[error("failed to start admin API on '{address}': {source}")]
    Admin {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the display host selected by `host.mode`.
pub fn build_host(config: &KioskConfig) -> Result<SharedHost, HostError> {
    Ok(match config.host.mode {
        HostMode::Remote => {
            tracing::info!(control_url = %config.host.control_url, "Using remote display host");
            Arc::new(RemoteHost::new(&config.host)?)
        }
        HostMode::Headless => {
            tracing::info!("Using headless display host");
            Arc::new(HeadlessHost::new())
        }
    })
}

/// Run the supervisor until shutdown.
pub async fn run(initial: KioskConfig, config_path: &Path) -> Result<(), StartupError> {
    if initial.observability.metrics_enabled {
        match initial.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %initial.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let host = build_host(&initial)?;
    let state = StateStore::open(initial.state.path.as_ref().map(PathBuf::from));
    let shared = config::shared(initial.clone());
    let shutdown = Shutdown::new();
    let mut stopped = shutdown.subscribe();

    let supervisor = Supervisor::new(
        shared.clone(),
        Arc::new(SystemClock),
        host,
        state,
        shutdown.clone(),
        Arc::new(OsProcess),
    );

    // Listeners
    let ingress = IngressServer::new(supervisor.clone(), initial.ingress.clone());
    let listener = ingress.bind().await?;
    let ingress_task = tokio::spawn(ingress.run(listener, shutdown.clone()));

    if initial.admin.enabled {
        let address = initial.admin.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Admin { address: address.clone(), source })?;
        let router = setup_admin_router(supervisor.clone());
        let mut rx = shutdown.subscribe();
        tracing::info!(address = %address, "Admin API starting");
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        });
    }

    // Hot reload
    let _watcher = if config_path.exists() {
        match ConfigWatcher::new(config_path, shared.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(path = ?config_path, error = %e, "Config hot reload unavailable");
                None
            }
        }
    } else {
        None
    };

    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    // Sessions
    let created = supervisor.create_all().await;
    tracing::info!(sessions = created, "Sessions created");

    tokio::spawn(Watchdog::new(supervisor.clone()).run(shutdown.subscribe()));

    if !shutdown.is_quitting() {
        let _ = stopped.recv().await;
    }
    tracing::info!("Shutting down");

    match tokio::time::timeout(DRAIN_TIMEOUT, ingress_task).await {
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Ingress server stopped with error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Ingress task failed"),
        Err(_) => tracing::warn!("Ingress server did not drain in time"),
        Ok(Ok(Ok(()))) => {}
    }

    Ok(())
}
