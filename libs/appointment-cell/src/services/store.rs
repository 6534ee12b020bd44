// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{representation_headers, SupabaseClient, SupabaseError};

use crate::models::{AppointmentError, AppointmentRequest, DeclinedBy, RequestStatus, ScheduleSlot};
use crate::services::schema::ProposeWritePath;

/// Reads and conditionally updates `appointment_requests`.
///
/// Every state-changing write carries the statuses it expects in its filter,
/// so an update that matches no row means another caller moved the request
/// first. Those writes return `Ok(None)` and leave the decision to the caller.
pub struct AppointmentRequestStore {
    supabase: Arc<SupabaseClient>,
    write_path: ProposeWritePath,
}

fn status_filter(expected: &[RequestStatus]) -> String {
    let list = expected.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
    format!("in.({})", list)
}

fn db_error(e: anyhow::Error) -> AppointmentError {
    if SupabaseError::is_bad_request(&e) {
        AppointmentError::SchemaError(e.to_string())
    } else {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl AppointmentRequestStore {
    pub fn new(supabase: Arc<SupabaseClient>, write_path: ProposeWritePath) -> Self {
        Self { supabase, write_path }
    }

    pub fn write_path(&self) -> ProposeWritePath {
        self.write_path
    }

    pub async fn get(&self, request_id: Uuid, auth_token: &str) -> Result<AppointmentRequest, AppointmentError> {
        debug!("Fetching appointment request {}", request_id);

        let path = format!("/rest/v1/appointment_requests?id=eq.{}", request_id);
        let rows: Vec<AppointmentRequest> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound(request_id))
    }

    async fn conditional_update(
        &self,
        request_id: Uuid,
        expected: &[RequestStatus],
        mut body: Map<String, Value>,
        auth_token: &str,
    ) -> Result<Option<AppointmentRequest>, AppointmentError> {
        body.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let path = format!(
            "/rest/v1/appointment_requests?id=eq.{}&status={}",
            request_id,
            status_filter(expected)
        );

        let rows: Vec<AppointmentRequest> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(body)),
                Some(representation_headers()),
            )
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    /// Writes a proposal through the configured write path. `None` means the
    /// request left `pending`/`proposed` since it was read.
    pub async fn write_proposal(
        &self,
        request_id: Uuid,
        slot: &ScheduleSlot,
        auth_token: &str,
    ) -> Result<Option<AppointmentRequest>, AppointmentError> {
        let body = match self.write_path.proposal_payload(slot) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let updated = self
            .conditional_update(
                request_id,
                &[RequestStatus::Pending, RequestStatus::Proposed],
                body,
                auth_token,
            )
            .await?;

        if updated.is_some() {
            info!("Proposed {} {} for request {} via {} schema", slot.date, slot.time.format("%H:%M"), request_id, self.write_path);
        }
        Ok(updated)
    }

    /// Final status flip of approve/accept. Clears any proposal and backfills
    /// the clinic and doctor the appointment was created with.
    pub async fn finalize_approval(
        &self,
        request_id: Uuid,
        clinic_id: Option<Uuid>,
        doctor_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<AppointmentRequest>, AppointmentError> {
        let mut body = self.write_path.cleared_proposal();
        body.insert("status".into(), json!(RequestStatus::Approved));
        if let Some(clinic_id) = clinic_id {
            body.insert("clinic_id".into(), json!(clinic_id));
        }
        if let Some(doctor_id) = doctor_id {
            body.insert("doctor_id".into(), json!(doctor_id));
        }

        let updated = self
            .conditional_update(
                request_id,
                &[RequestStatus::Pending, RequestStatus::Proposed],
                body,
                auth_token,
            )
            .await?;

        match &updated {
            Some(_) => info!("Request {} approved", request_id),
            None => warn!("Request {} changed status before approval could be recorded", request_id),
        }
        Ok(updated)
    }

    pub async fn mark_declined(
        &self,
        request_id: Uuid,
        expected: &[RequestStatus],
        declined_by: DeclinedBy,
        reason: Option<&str>,
        auth_token: &str,
    ) -> Result<Option<AppointmentRequest>, AppointmentError> {
        let mut body = self.write_path.cleared_proposal();
        body.insert("status".into(), json!(RequestStatus::Declined));
        body.insert("declined_by".into(), json!(declined_by));
        body.insert("decline_reason".into(), json!(reason));

        let updated = self.conditional_update(request_id, expected, body, auth_token).await?;
        if updated.is_some() {
            info!("Request {} declined by {:?}", request_id, declined_by);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_lists_expected_statuses() {
        assert_eq!(
            status_filter(&[RequestStatus::Pending, RequestStatus::Proposed]),
            "in.(pending,proposed)"
        );
        assert_eq!(status_filter(&[RequestStatus::Proposed]), "in.(proposed)");
    }
}
