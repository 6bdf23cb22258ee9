//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define supervisor metrics (recoveries, reloads, recreates, retries)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-session and aggregate metrics
//!
//! # Metrics
//! - `kiosk_heartbeats_total` (counter)
//! - `kiosk_recoveries_total` (counter): by reason
//! - `kiosk_recoveries_in_window` (gauge): by session
//! - `kiosk_reloads_total` (counter): by outcome
//! - `kiosk_recreates_total` (counter): by reason
//! - `kiosk_network_retries_total` (counter)
//! - `kiosk_drift_corrections_total` (counter): by kind
//! - `kiosk_hard_relaunch_total` (counter): by reason
//! - `kiosk_session_live` (gauge): 1=surface present, 0=missing
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so tests need no setup
//! - Labels stay low-cardinality (reason, kind, session index)

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::SessionIndex;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_heartbeat() {
    counter!("kiosk_heartbeats_total").increment(1);
}

pub fn record_recovery(index: SessionIndex, reason: &str, in_window: usize) {
    counter!("kiosk_recoveries_total", "reason" => reason.to_string()).increment(1);
    gauge!("kiosk_recoveries_in_window", "index" => index.to_string()).set(in_window as f64);
}

pub fn record_reload(outcome: &'static str) {
    counter!("kiosk_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_recreate(reason: &str) {
    counter!("kiosk_recreates_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_network_retry() {
    counter!("kiosk_network_retries_total").increment(1);
}

pub fn record_drift_correction(kind: &'static str) {
    counter!("kiosk_drift_corrections_total", "kind" => kind).increment(1);
}

pub fn record_hard_relaunch(reason: &str) {
    counter!("kiosk_hard_relaunch_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_session_live(index: SessionIndex, live: bool) {
    gauge!("kiosk_session_live", "index" => index.to_string()).set(if live { 1.0 } else { 0.0 });
}
