use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::models::WorkerConfig;
use crate::services::sweep::ReminderSweepService;

/// Runs the reminder sweep on a fixed interval until shut down.
pub struct ReminderWorker {
    config: WorkerConfig,
    sweep: Arc<ReminderSweepService>,
    is_shutdown: RwLock<bool>,
    wake: Notify,
}

impl ReminderWorker {
    pub fn new(config: WorkerConfig, sweep: Arc<ReminderSweepService>) -> Self {
        for window in config.narrow_windows() {
            warn!(
                "Reminder interval {:?} is more than half the {} window; reminders may be missed",
                config.interval, window
            );
        }

        Self {
            config,
            sweep,
            is_shutdown: RwLock::new(false),
            wake: Notify::new(),
        }
    }

    #[instrument(skip(self), fields(interval = ?self.config.interval))]
    pub async fn start(&self) {
        info!("Starting reminder worker");

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }

            if *self.is_shutdown.read().await {
                debug!("Reminder worker received shutdown signal");
                break;
            }

            if let Err(e) = self.sweep.run_once().await {
                error!("Reminder sweep failed: {}", e);
            }
        }

        info!("Reminder worker stopped");
    }

    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
        self.wake.notify_one();
    }
}
