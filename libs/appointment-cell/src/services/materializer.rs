// libs/appointment-cell/src/services/materializer.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{representation_headers, SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::context::SchedulingContext;

#[derive(Debug, Clone)]
pub struct Materialized {
    pub appointment: Appointment,
    /// False when the row already existed for this request.
    pub created: bool,
}

/// Insert body for a fresh appointment.
pub fn build_row(context: &SchedulingContext, request_id: Uuid) -> Value {
    json!({
        "request_id": request_id,
        "clinic_id": context.clinic.id,
        "doctor_id": context.doctor.id,
        "patient_id": context.patient.id,
        "date": context.slot.date.format("%Y-%m-%d").to_string(),
        "time": context.slot.time.format("%H:%M").to_string(),
        "end_time": context.slot.end_time.map(|t| t.format("%H:%M").to_string()),
        "status": AppointmentStatus::Scheduled,
        "reason": context.reason,
        "notes": context.notes,
        "reminder_24h_sent": false,
        "reminder_2h_sent": false,
        "created_at": Utc::now().to_rfc3339(),
    })
}

/// Creates the appointment for a request. The unique `request_id` column
/// makes this idempotent: a conflicting insert returns the existing row.
pub struct AppointmentMaterializer {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentMaterializer {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn materialize(
        &self,
        context: &SchedulingContext,
        request_id: Uuid,
        auth_token: &str,
    ) -> Result<Materialized, AppointmentError> {
        let result: anyhow::Result<Vec<Appointment>> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(build_row(context, request_id)),
                Some(representation_headers()),
            )
            .await;

        match result {
            Ok(rows) => {
                let appointment = rows.into_iter().next().ok_or_else(|| {
                    AppointmentError::DatabaseError("appointment insert returned no row".to_string())
                })?;
                info!("Created appointment {} for request {}", appointment.id, request_id);
                Ok(Materialized { appointment, created: true })
            }
            Err(e) if SupabaseError::is_conflict(&e) => {
                debug!("Request {} already has an appointment", request_id);
                let appointment = self
                    .find_by_request(request_id, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::DatabaseError(format!(
                        "appointment for request {} conflicted but could not be loaded",
                        request_id
                    )))?;
                Ok(Materialized { appointment, created: false })
            }
            Err(e) => Err(AppointmentError::DatabaseError(e.to_string())),
        }
    }

    pub async fn find_by_request(
        &self,
        request_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?request_id=eq.{}&limit=1", request_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Compensating delete for an appointment whose request was declined
    /// before the approval could be recorded.
    pub async fn discard(&self, appointment_id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| {
                warn!("Failed to discard appointment {}: {}", appointment_id, e);
                AppointmentError::DatabaseError(e.to_string())
            })?;

        info!("Discarded appointment {}", appointment_id);
        Ok(())
    }
}
