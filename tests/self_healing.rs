//! End-to-end self-healing scenarios against a headless host.

use std::time::Duration;

use kiosk_supervisor::config::KioskConfig;
use kiosk_supervisor::recovery::StateStore;
use kiosk_supervisor::supervisor::{SurfaceEvent, SurfaceSignal};
use kiosk_supervisor::surface::{HostOp, LoadError};
use kiosk_supervisor::watchdog::{RecoveryReason, Verdict};

mod common;

use common::{harness, harness_with_state, index, kiosk_config, playing, DESIRED, DRIFT};

#[tokio::test]
async fn test_create_all_builds_every_screen() {
    let h = harness(kiosk_config(3));

    assert_eq!(h.supervisor.create_all().await, 3);
    assert_eq!(h.host.surface_count(), 3);
    assert_eq!(h.host.load_count(DESIRED), 3);

    let first = h.supervisor.registry().get(index(0)).unwrap();
    let surface = h.host.surface(first).unwrap();
    assert_eq!(surface.spec.title_suffix, "Screen 1");
    assert!(surface.spec.maximize_hint);
    assert!(surface.user_agent.is_some());

    let second = h.host.surface(h.supervisor.registry().get(index(1)).unwrap()).unwrap();
    assert!(!second.spec.maximize_hint);
}

#[tokio::test]
async fn test_no_display_config_creates_fallback_session() {
    let h = harness(KioskConfig::default());

    assert_eq!(h.supervisor.create_all().await, 1);
    let id = h.supervisor.registry().get(index(0)).unwrap();
    assert!(h.host.surface(id).unwrap().spec.allow_config_fallback);

    // the watchdog leaves an unconfigured kiosk alone
    assert!(h.watchdog.tick().await.is_empty());
}

#[tokio::test]
async fn test_stale_heartbeat_triggers_recovery_and_reload() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;

    h.supervisor.handle_heartbeat(&playing(0, 10.0));
    h.clock.advance(Duration::from_millis(50_000));

    let verdicts = h.watchdog.tick().await;
    assert_eq!(verdicts, vec![(index(0), Verdict::Recover(RecoveryReason::HeartbeatTimeout))]);

    let record = h.supervisor.health().get_record(index(0));
    assert_eq!(record.recover_count, 1);
    assert_eq!(record.last_recover_at, Some(common::START_MS + 50_000));
    assert_eq!(h.host.reload_count(), 1);

    // the next tick is inside the recovery cooldown
    h.clock.advance(Duration::from_millis(15_000));
    let verdicts = h.watchdog.tick().await;
    assert_eq!(verdicts, vec![(index(0), Verdict::CoolingDown(RecoveryReason::HeartbeatTimeout))]);
    assert_eq!(h.host.reload_count(), 1);
}

#[tokio::test]
async fn test_flat_stream_is_a_stall() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;

    h.supervisor.handle_heartbeat(&playing(0, 10.0));
    for _ in 0..13 {
        h.clock.advance(Duration::from_millis(10_000));
        h.supervisor.handle_heartbeat(&playing(0, 10.1));
    }

    let verdicts = h.watchdog.tick().await;
    assert_eq!(verdicts, vec![(index(0), Verdict::Recover(RecoveryReason::StreamStall))]);
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);
}

#[tokio::test]
async fn test_missing_surface_is_always_recreated() {
    let h = harness(kiosk_config(2));
    h.supervisor.create_all().await;
    let old = h.supervisor.registry().get(index(1)).unwrap();

    // a fresh recovery would block a reload, but never a recreate
    h.supervisor.escalator().note_recovery(index(1), "unresponsive");
    h.host.vanish(old);

    let verdicts = h.watchdog.tick().await;
    assert_eq!(verdicts[1], (index(1), Verdict::Missing));

    let new = h.supervisor.registry().get(index(1)).unwrap();
    assert_ne!(new, old);
    assert_eq!(h.host.create_count(), 3);
    assert_eq!(h.supervisor.health().get_record(index(1)).recover_count, 1);
}

#[tokio::test]
async fn test_unknown_liveness_skips_session_for_one_tick() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let id = h.supervisor.registry().get(index(0)).unwrap();
    h.host.fail_liveness(true);

    assert!(h.watchdog.tick().await.is_empty());
    assert_eq!(h.supervisor.registry().get(index(0)), Some(id));
    assert_eq!(h.host.create_count(), 1);
    assert!(!h.host.ops().contains(&HostOp::Destroy(id)));
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 0);

    h.host.fail_liveness(false);
    assert_eq!(h.watchdog.tick().await, vec![(index(0), Verdict::Healthy)]);
}

#[tokio::test]
async fn test_blank_page_is_reloaded() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let id = h.supervisor.registry().get(index(0)).unwrap();
    h.host.set_url(id, "chrome-error://chromewebdata/");

    let verdicts = h.watchdog.tick().await;
    assert_eq!(verdicts, vec![(index(0), Verdict::Recover(RecoveryReason::BlankOrErrorUrl))]);
    assert!(h.host.ops().contains(&HostOp::Reload { id, bypass_cache: true }));
}

#[tokio::test]
async fn test_failed_reload_falls_back_to_recreate() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let old = h.supervisor.registry().get(index(0)).unwrap();
    h.host.fail_reloads(true);

    assert!(!h.supervisor.reload(index(0)).await);

    let new = h.supervisor.registry().get(index(0)).unwrap();
    assert_ne!(old, new);
    assert!(h.host.ops().contains(&HostOp::Destroy(old)));
}

#[tokio::test]
async fn test_closed_signal_notes_recovery_then_recreates() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let old = h.supervisor.registry().get(index(0)).unwrap();

    h.supervisor
        .handle_surface_event(SurfaceEvent { index: index(0), surface: old, signal: SurfaceSignal::Closed })
        .await;

    let new = h.supervisor.registry().get(index(0)).unwrap();
    assert_ne!(old, new);
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);

    // a late signal from the replaced surface is ignored
    h.supervisor
        .handle_surface_event(SurfaceEvent { index: index(0), surface: old, signal: SurfaceSignal::Closed })
        .await;
    assert_eq!(h.supervisor.registry().get(index(0)), Some(new));
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);
}

#[tokio::test]
async fn test_renderer_crash_recreates() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let old = h.supervisor.registry().get(index(0)).unwrap();

    let signal = SurfaceSignal::RendererGone { reason: "crashed".into(), exit_code: Some(139) };
    h.supervisor
        .handle_surface_event(SurfaceEvent { index: index(0), surface: old, signal })
        .await;

    assert_ne!(h.supervisor.registry().get(index(0)), Some(old));
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);
}

#[tokio::test]
async fn test_five_recoveries_relaunch_once_and_quiet_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiosk-state.json");
    let h = harness_with_state(kiosk_config(1), StateStore::open(Some(path.clone())));
    h.supervisor.create_all().await;

    for _ in 0..5 {
        let id = h.supervisor.registry().get(index(0)).unwrap();
        h.supervisor
            .handle_surface_event(SurfaceEvent { index: index(0), surface: id, signal: SurfaceSignal::Unresponsive })
            .await;
        h.clock.advance(Duration::from_secs(31));
    }

    assert_eq!(h.relaunches(), 1);
    assert!(h.shutdown.is_quitting());
    assert!(StateStore::open(Some(path)).relaunch_guard().last_hard_restart_at > 0);

    // after teardown started nothing touches a surface
    let reloads = h.host.reload_count();
    assert!(h.watchdog.tick().await.is_empty());
    assert!(!h.supervisor.reload(index(0)).await);
    assert_eq!(h.host.reload_count(), reloads);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_shows_offline_page_and_retries() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let id = h.supervisor.registry().get(index(0)).unwrap();

    let failed = SurfaceSignal::LoadFailed {
        error_code: -106,
        description: "ERR_INTERNET_DISCONNECTED".into(),
        url: DESIRED.into(),
        is_main_frame: true,
    };
    for _ in 0..2 {
        h.supervisor
            .handle_surface_event(SurfaceEvent { index: index(0), surface: id, signal: failed.clone() })
            .await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let offline_loads = h
        .host
        .ops()
        .iter()
        .filter(|op| matches!(op, HostOp::Load { url, .. } if url.contains("offline.html")))
        .count();
    assert_eq!(offline_loads, 1);
    assert_eq!(h.supervisor.backoff().state(index(0)).unwrap().net_fail_count, 2);
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 0);

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(h.host.load_count(DESIRED), 2);

    h.supervisor
        .handle_surface_event(SurfaceEvent {
            index: index(0),
            surface: id,
            signal: SurfaceSignal::LoadFinished { url: DESIRED.into() },
        })
        .await;
    assert_eq!(h.supervisor.backoff().state(index(0)).unwrap().net_fail_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_failure_goes_to_backoff() {
    let h = harness(kiosk_config(1));
    h.host.fail_loads(Some(LoadError::from_failure(-105, "ERR_NAME_NOT_RESOLVED")));

    h.supervisor.create_all().await;
    assert!(h.supervisor.backoff().is_retry_pending(index(0)));

    h.host.fail_loads(None);
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(h.host.load_count(DESIRED), 2);
    assert!(!h.supervisor.backoff().is_retry_pending(index(0)));
}

#[tokio::test(start_paused = true)]
async fn test_other_load_failures_reload_with_throttle() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let id = h.supervisor.registry().get(index(0)).unwrap();

    let failed = SurfaceSignal::LoadFailed {
        error_code: -324,
        description: "ERR_EMPTY_RESPONSE".into(),
        url: DESIRED.into(),
        is_main_frame: true,
    };
    for _ in 0..3 {
        h.supervisor
            .handle_surface_event(SurfaceEvent { index: index(0), surface: id, signal: failed.clone() })
            .await;
    }

    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);
    assert_eq!(h.host.reload_count(), 1);

    let aborted = SurfaceSignal::LoadFailed {
        error_code: -3,
        description: "ERR_ABORTED".into(),
        url: DESIRED.into(),
        is_main_frame: true,
    };
    h.clock.advance(Duration::from_secs(5));
    h.supervisor
        .handle_surface_event(SurfaceEvent { index: index(0), surface: id, signal: aborted })
        .await;
    assert_eq!(h.supervisor.health().get_record(index(0)).recover_count, 1);
    assert!(h.supervisor.backoff().state(index(0)).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_redirect_drift_is_prevented() {
    let h = harness(kiosk_config(1));
    h.supervisor.create_all().await;
    let id = h.supervisor.registry().get(index(0)).unwrap();

    let verdict = h
        .supervisor
        .handle_surface_event(SurfaceEvent {
            index: index(0),
            surface: id,
            signal: SurfaceSignal::WillRedirect { url: DRIFT.into() },
        })
        .await;
    assert_eq!(verdict, kiosk_supervisor::navigation::NavigationVerdict::Prevent);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.host.load_count(DESIRED), 2);
}
