// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ApproveRequest, DeclineRequest, DeclinedBy, ProposeRequest};
use crate::services::approval::AppointmentApprovalService;
use crate::state::AppointmentState;

fn require_clinic_staff(user: &User, action: &str) -> Result<(), AppError> {
    if user.caller_role().is_clinic_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Only clinic staff can {} appointment requests", action)))
    }
}

// ==============================================================================
// READ
// ==============================================================================

#[axum::debug_handler]
pub async fn get_request(
    State(state): State<Arc<AppointmentState>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentApprovalService::new(&state);

    let request = service.get_request(request_id, token).await?;

    if !user.caller_role().is_clinic_staff() && !service.is_request_patient(&request, &user, token).await? {
        return Err(AppError::Forbidden("Not authorized to view this appointment request".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "request": request,
    })))
}

// ==============================================================================
// CLINIC ACTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn propose_time(
    State(state): State<Arc<AppointmentState>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(input): Json<ProposeRequest>,
) -> Result<Json<Value>, AppError> {
    require_clinic_staff(&user, "propose times for")?;

    let service = AppointmentApprovalService::new(&state);
    let outcome = service.propose(request_id, input, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "id": outcome.id,
        "status": outcome.status,
    })))
}

#[axum::debug_handler]
pub async fn approve_request(
    State(state): State<Arc<AppointmentState>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Value>, AppError> {
    require_clinic_staff(&user, "approve")?;

    let overrides = body.map(|Json(overrides)| overrides).unwrap_or_default();
    let service = AppointmentApprovalService::new(&state);
    let appointment = service.approve(request_id, overrides, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// PATIENT ACTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn accept_proposal(
    State(state): State<Arc<AppointmentState>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentApprovalService::new(&state);

    if !user.is_admin() {
        let request = service.get_request(request_id, token).await?;
        if !service.is_request_patient(&request, &user, token).await? {
            return Err(AppError::Forbidden("Only the requesting patient can accept a proposal".to_string()));
        }
    }

    let appointment = service.accept(request_id, token).await?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment.id,
        "appointment": appointment,
    })))
}

/// Patients decline a proposal; clinic staff reject a request outright.
#[axum::debug_handler]
pub async fn decline_request(
    State(state): State<Arc<AppointmentState>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    body: Option<Json<DeclineRequest>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let input = body.map(|Json(input)| input).unwrap_or_default();
    let service = AppointmentApprovalService::new(&state);

    let declined_by = if user.caller_role().is_clinic_staff() {
        DeclinedBy::Clinic
    } else {
        let request = service.get_request(request_id, token).await?;
        if !service.is_request_patient(&request, &user, token).await? {
            return Err(AppError::Forbidden("Not authorized to decline this appointment request".to_string()));
        }
        DeclinedBy::Patient
    };

    let outcome = service.decline(request_id, input, declined_by, token).await?;

    Ok(Json(json!({
        "success": true,
        "id": outcome.id,
        "status": outcome.status,
        "declined_by": declined_by,
    })))
}
