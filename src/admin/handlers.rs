use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::{HealthRecord, SessionIndex};
use crate::recovery::RelaunchGuard;
use crate::resilience::RetryState;
use crate::surface::SurfaceId;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub configured_sessions: usize,
    pub live_sessions: usize,
}

#[derive(Serialize)]
pub struct SessionStatus {
    pub index: SessionIndex,
    pub surface: Option<SurfaceId>,
    pub desired_url: Option<String>,
    pub health: HealthRecord,
    pub retry: Option<RetryState>,
}

#[derive(Serialize)]
pub struct RelaunchGuardStatus {
    #[serde(flatten)]
    pub guard: RelaunchGuard,
    pub path: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let sup = &state.supervisor;
    let configured = sup
        .config()
        .load()
        .display
        .as_ref()
        .map(|d| d.screen_count())
        .unwrap_or(0);

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if sup.shutdown().is_quitting() { "shutting_down" } else { "operational" },
        uptime_secs: state.started_at.elapsed().as_secs(),
        configured_sessions: configured,
        live_sessions: sup.registry().snapshot().len(),
    })
}

pub async fn get_sessions(State(state): State<AdminState>) -> Json<Vec<SessionStatus>> {
    let sup = &state.supervisor;

    let mut indices: Vec<SessionIndex> = sup.registry().snapshot().into_iter().map(|(i, _)| i).collect();
    indices.extend(sup.health().snapshot().into_iter().map(|(i, _)| i));
    indices.sort();
    indices.dedup();

    let sessions = indices
        .into_iter()
        .map(|index| SessionStatus {
            index,
            surface: sup.registry().get(index),
            desired_url: sup.destinations().desired_url(index),
            health: sup.health().get_record(index),
            retry: sup.backoff().state(index),
        })
        .collect();

    Json(sessions)
}

pub async fn get_relaunch_guard(State(state): State<AdminState>) -> Json<RelaunchGuardStatus> {
    let store = state.supervisor.escalator().state();
    Json(RelaunchGuardStatus {
        guard: store.relaunch_guard(),
        path: store.path().map(|p| p.display().to_string()),
    })
}
