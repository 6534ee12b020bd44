use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;
use shared_utils::extractor::verify_shared_secret;

use crate::router::ReminderState;

/// Cron entry point; gated by the shared secret when one is configured.
#[axum::debug_handler]
pub async fn run_sweep(
    State(state): State<Arc<ReminderState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    verify_shared_secret(&headers, state.config.reminder_cron_secret.as_deref())?;

    let report = state.sweep.run_once().await?;

    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}
