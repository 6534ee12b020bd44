// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use messaging_cell::Notifier;
use shared_config::AppConfig;

use crate::services::schema::ProposeWritePath;

/// Shared handler state. The write path and notifier are fixed at startup.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub notifier: Arc<Notifier>,
    pub write_path: ProposeWritePath,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, notifier: Arc<Notifier>, write_path: ProposeWritePath) -> Self {
        Self { config, notifier, write_path }
    }
}
