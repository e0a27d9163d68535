//! Periodic eviction of stale strokes and empty sessions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::hub::Relay;

/// Background sweep over the relay's sessions
pub struct MaintenanceTask {
    relay: Arc<Relay>,
    interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
    sweeps: u64,
}

impl MaintenanceTask {
    /// Spawn the sweep as a background task
    pub fn spawn(
        relay: Arc<Relay>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let task = Self {
            relay,
            interval,
            shutdown_rx,
            sweeps: 0,
        };
        tokio::spawn(async move {
            task.run().await;
        })
    }

    async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Maintenance task started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!(sweeps = self.sweeps, "Maintenance task shutting down");
                    break;
                }
                _ = interval.tick() => self.sweep(),
            }
        }
    }

    fn sweep(&mut self) {
        self.sweeps += 1;
        let report = self.relay.evict_expired();
        if report.strokes_evicted > 0 || report.sessions_removed > 0 {
            info!(
                strokes_evicted = report.strokes_evicted,
                sessions_removed = report.sessions_removed,
                "Maintenance sweep"
            );
        } else {
            debug!(sweep = self.sweeps, "Maintenance sweep found nothing to evict");
        }
    }
}
