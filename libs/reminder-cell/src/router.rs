use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::sweep::ReminderSweepService;

pub struct ReminderState {
    pub config: Arc<AppConfig>,
    pub sweep: Arc<ReminderSweepService>,
}

pub fn reminder_routes(state: Arc<ReminderState>) -> Router {
    Router::new()
        .route("/sweep", post(handlers::run_sweep))
        .with_state(state)
}
