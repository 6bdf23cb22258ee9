//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiosk_supervisor::clock::ManualClock;
use kiosk_supervisor::config::{self, DisplayConfig, KioskConfig, ScreenConfig};
use kiosk_supervisor::health::{Heartbeat, SessionIndex, VideoSummary};
use kiosk_supervisor::lifecycle::{ProcessControl, Shutdown};
use kiosk_supervisor::recovery::StateStore;
use kiosk_supervisor::surface::HeadlessHost;
use kiosk_supervisor::{IngressServer, Supervisor, Watchdog};
use tokio::net::TcpListener;

pub const DESIRED: &str = "https://nvr.local/protect/dashboard/abc";
pub const DRIFT: &str = "https://nvr.local/protect/dashboard/all";
pub const START_MS: u64 = 1_700_000_000_000;

/// Process control that only counts calls.
#[derive(Debug, Default)]
pub struct RecordingProcess {
    pub relaunches: AtomicUsize,
    pub exits: AtomicUsize,
}

impl ProcessControl for RecordingProcess {
    fn relaunch(&self) -> std::io::Result<()> {
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exit(&self, _code: i32) {
        self.exits.fetch_add(1, Ordering::SeqCst);
    }
}

/// A supervisor wired to a headless host, a manual clock and a recording
/// process.
pub struct Harness {
    pub supervisor: Supervisor,
    pub watchdog: Watchdog,
    pub host: HeadlessHost,
    pub clock: ManualClock,
    pub process: Arc<RecordingProcess>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl Harness {
    pub fn relaunches(&self) -> usize {
        self.process.relaunches.load(Ordering::SeqCst)
    }
}

pub fn kiosk_config(screens: usize) -> KioskConfig {
    let mut config = KioskConfig::default();
    config.display = Some(DisplayConfig {
        url: DESIRED.into(),
        screens,
        screens_config: vec![ScreenConfig { url: None, maximize: true }],
    });
    config
}

pub fn harness(config: KioskConfig) -> Harness {
    harness_with_state(config, StateStore::in_memory())
}

#[allow(dead_code)]
pub fn harness_with_state(config: KioskConfig, state: StateStore) -> Harness {
    let clock = ManualClock::new(START_MS);
    let host = HeadlessHost::new();
    let process = Arc::new(RecordingProcess::default());
    let shutdown = Shutdown::new();

    let supervisor = Supervisor::new(
        config::shared(config),
        Arc::new(clock.clone()),
        Arc::new(host.clone()),
        state,
        shutdown.clone(),
        process.clone(),
    );
    let watchdog = Watchdog::new(supervisor.clone());

    Harness {
        supervisor,
        watchdog,
        host,
        clock,
        process,
        shutdown,
    }
}

pub fn index(i: usize) -> SessionIndex {
    SessionIndex::new(i).unwrap()
}

#[allow(dead_code)]
pub fn playing(i: usize, position: f64) -> Heartbeat {
    Heartbeat {
        screen_index: index(i),
        href: DESIRED.into(),
        video: VideoSummary {
            count: 1,
            any_playing: true,
            max_current_time: Some(position),
        },
    }
}

/// Start the ingress server for `supervisor` on an ephemeral port.
#[allow(dead_code)]
pub async fn start_ingress(supervisor: Supervisor) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = supervisor.shutdown().clone();
    let config = supervisor.config().load().ingress.clone();
    let server = IngressServer::new(supervisor, config);

    tokio::spawn(async move {
        let _ = server.run(listener, shutdown).await;
    });
    addr
}
