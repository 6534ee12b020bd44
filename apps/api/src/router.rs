use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_request_routes, AppointmentState};
use reminder_cell::{reminder_routes, ReminderState};

pub fn create_router(appointments: Arc<AppointmentState>, reminders: Arc<ReminderState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dental clinic API is running!" }))
        .nest("/appointment-requests", appointment_request_routes(appointments))
        .nest("/reminders", reminder_routes(reminders))
}
