//! Periodic watchdog.
//!
//! # Responsibilities
//! - Every tick, assess each configured session
//! - Recreate missing sessions, note recovery and reload unhealthy ones
//!
//! # Design Decisions
//! - The first tick fires one interval after start, giving sessions time
//!   to load and report
//! - A slow tick delays the next one instead of bursting to catch up
//! - Nothing happens while there is no display configuration
//! - A session whose liveness the host cannot report is left alone until
//!   the next tick

use tokio::sync::broadcast;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::health::SessionIndex;
use crate::supervisor::Supervisor;
use crate::watchdog::assess::{assess, Verdict};

/// Drives periodic health assessment of every session.
#[derive(Clone)]
pub struct Watchdog {
    supervisor: Supervisor,
}

impl Watchdog {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let period = Duration::from_millis(self.supervisor.config().load().watchdog.tick_interval_ms);
        tracing::info!(interval_ms = period.as_millis() as u64, "Watchdog starting");

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Watchdog received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Assess and act on every configured session once.
    pub async fn tick(&self) -> Vec<(SessionIndex, Verdict)> {
        let sup = &self.supervisor;
        if sup.shutdown().is_quitting() {
            return Vec::new();
        }

        let config = sup.config().load_full();
        let Some(display) = config.display.as_ref() else {
            return Vec::new();
        };

        let now = sup.clock().now_ms();
        let mut verdicts = Vec::new();

        for index in SessionIndex::range(display.screen_count()) {
            if sup.shutdown().is_quitting() {
                break;
            }

            let live = match sup.registry().get(index) {
                Some(id) => match sup.host().surface_exists(id).await {
                    Ok(exists) => exists.then_some(id),
                    Err(e) => {
                        tracing::warn!(index = %index, surface = %id, error = %e, "Liveness unknown; skipping session this tick");
                        continue;
                    }
                },
                None => None,
            };
            let current_url = match live {
                Some(id) => sup.host().current_url(id).await.unwrap_or_default(),
                None => String::new(),
            };

            let record = sup.health().get_record(index);
            let verdict = assess(now, live.is_some(), &current_url, &record, &config.watchdog);

            match verdict {
                Verdict::Missing => {
                    sup.recreate(index, "missing").await;
                }
                Verdict::Recover(reason) => {
                    sup.escalator().note_recovery(index, reason.as_str());
                    sup.reload(index).await;
                }
                Verdict::CoolingDown(reason) => {
                    tracing::debug!(index = %index, reason = %reason, "Recovery cooling down");
                }
                Verdict::Healthy => {}
            }

            verdicts.push((index, verdict));
        }

        verdicts
    }
}
