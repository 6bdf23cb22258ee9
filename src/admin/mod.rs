//! Admin status API.
//!
//! # Routes
//! ```text
//! GET /admin/status          version, uptime, quitting flag, session count
//! GET /admin/sessions        per-session surface, health record, retry state
//! GET /admin/relaunch-guard  persisted lastHardRestartAt
//! ```
//!
//! All routes require `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::time::Instant;

use axum::{middleware, routing::get, Router};

use crate::supervisor::Supervisor;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub supervisor: Supervisor,
    pub started_at: Instant,
}

pub fn setup_admin_router(supervisor: Supervisor) -> Router {
    let state = AdminState {
        supervisor,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/sessions", get(get_sessions))
        .route("/admin/relaunch-guard", get(get_relaunch_guard))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
