// libs/appointment-cell/src/services/schema.rs
use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{AppointmentError, RequestStatus, ScheduleSlot};

/// How a proposal is written to `appointment_requests`. Chosen once at
/// startup; a propose performs exactly one write through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposeWritePath {
    /// `proposed_date` / `proposed_time` / `proposed_end_time` plus status.
    #[default]
    ProposalColumns,
    /// Overwrites the request's own slot plus status.
    RewriteSlot,
    /// Overwrites the slot only; the status column rejects `proposed`.
    RewriteSlotWithoutStatus,
}

impl FromStr for ProposeWritePath {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(ProposeWritePath::ProposalColumns),
            "legacy" => Ok(ProposeWritePath::RewriteSlot),
            "legacy_without_status" => Ok(ProposeWritePath::RewriteSlotWithoutStatus),
            other => Err(AppointmentError::SchemaError(format!(
                "unknown appointment request schema '{}', expected current, legacy or legacy_without_status",
                other
            ))),
        }
    }
}

impl fmt::Display for ProposeWritePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposeWritePath::ProposalColumns => write!(f, "current"),
            ProposeWritePath::RewriteSlot => write!(f, "legacy"),
            ProposeWritePath::RewriteSlotWithoutStatus => write!(f, "legacy_without_status"),
        }
    }
}

fn clock(slot_time: Option<chrono::NaiveTime>) -> Value {
    slot_time
        .map(|t| Value::String(t.format("%H:%M").to_string()))
        .unwrap_or(Value::Null)
}

impl ProposeWritePath {
    pub fn has_proposal_columns(&self) -> bool {
        matches!(self, ProposeWritePath::ProposalColumns)
    }

    /// Status the request carries after a propose through this path.
    pub fn resulting_status(&self, current: RequestStatus) -> RequestStatus {
        match self {
            ProposeWritePath::RewriteSlotWithoutStatus => current,
            _ => RequestStatus::Proposed,
        }
    }

    pub fn proposal_payload(&self, slot: &ScheduleSlot) -> Value {
        let mut body = Map::new();
        let date = Value::String(slot.date.format("%Y-%m-%d").to_string());

        match self {
            ProposeWritePath::ProposalColumns => {
                body.insert("proposed_date".into(), date);
                body.insert("proposed_time".into(), clock(Some(slot.time)));
                body.insert("proposed_end_time".into(), clock(slot.end_time));
                body.insert("status".into(), json!(RequestStatus::Proposed));
            }
            ProposeWritePath::RewriteSlot => {
                body.insert("date".into(), date);
                body.insert("time".into(), clock(Some(slot.time)));
                body.insert("end_time".into(), clock(slot.end_time));
                body.insert("status".into(), json!(RequestStatus::Proposed));
            }
            ProposeWritePath::RewriteSlotWithoutStatus => {
                body.insert("date".into(), date);
                body.insert("time".into(), clock(Some(slot.time)));
                body.insert("end_time".into(), clock(slot.end_time));
            }
        }

        Value::Object(body)
    }

    /// Fields that must be nulled when a request leaves the proposal stage.
    pub fn cleared_proposal(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if self.has_proposal_columns() {
            for column in ["proposed_date", "proposed_time", "proposed_end_time"] {
                body.insert(column.into(), Value::Null);
            }
        }
        body
    }

    /// Explicit configuration wins; otherwise the `proposed_date` column is
    /// probed. PostgREST answers an unknown column with 400.
    pub async fn detect(config: &AppConfig) -> Result<Self, AppointmentError> {
        if let Some(configured) = config.appointment_request_schema.as_deref() {
            let path = configured.parse::<ProposeWritePath>()?;
            info!("Appointment request schema configured as {}", path);
            return Ok(path);
        }

        let supabase = SupabaseClient::new(config);
        let probe = supabase
            .request::<Vec<Value>>(
                Method::GET,
                "/rest/v1/appointment_requests?select=proposed_date&limit=1",
                Some(config.service_token()),
                None,
            )
            .await;

        match probe {
            Ok(_) => {
                info!("Appointment request schema detected as current");
                Ok(ProposeWritePath::ProposalColumns)
            }
            Err(e) if SupabaseError::is_bad_request(&e) => {
                warn!("appointment_requests has no proposal columns; proposals overwrite the requested slot");
                Ok(ProposeWritePath::RewriteSlot)
            }
            Err(e) => Err(AppointmentError::SchemaError(format!("schema probe failed: {}", e))),
        }
    }
}
