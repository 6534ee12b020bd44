// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_request_routes(state: Arc<AppointmentState>) -> Router {
    let protected_routes = Router::new()
        .route("/{request_id}", get(handlers::get_request))
        .route("/{request_id}/propose", post(handlers::propose_time))
        .route("/{request_id}/approve", post(handlers::approve_request))
        .route("/{request_id}/accept", post(handlers::accept_proposal))
        .route("/{request_id}/decline", post(handlers::decline_request))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
