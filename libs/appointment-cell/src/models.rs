// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use identity_cell::IdentityError;
use shared_models::error::AppError;

// ==============================================================================
// CLOCK FORMAT
// ==============================================================================

/// Times of day travel as `HH:MM`; `HH:MM:SS` (Postgres `time`) is accepted on read.
pub mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| format!("invalid time of day '{}', expected HH:MM", raw))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&t.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => super::parse(&raw).map(Some).map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

// ==============================================================================
// SCHEDULING
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub time: NaiveTime,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
}

impl ScheduleSlot {
    /// Absolute start, reading the wall-clock date and time in `offset`.
    pub fn start_at(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        offset
            .from_local_datetime(&self.date.and_time(self.time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn validate(&self) -> Result<(), AppointmentError> {
        match self.end_time {
            Some(end) if end <= self.time => Err(AppointmentError::InvalidSchedule(format!(
                "end time {} must be after start time {}",
                end.format("%H:%M"),
                self.time.format("%H:%M")
            ))),
            _ => Ok(()),
        }
    }
}

/// Offset east of UTC for the clinic's wall clock, in minutes.
pub fn clinic_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

// ==============================================================================
// APPOINTMENT REQUEST
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Proposed,
    Approved,
    Declined,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Proposed => write!(f, "proposed"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Declined => write!(f, "declined"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeclinedBy {
    Patient,
    Clinic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub clinic_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    /// Contact address of a doctor who has no account yet.
    #[serde(default)]
    pub target_doctor_email: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub time: NaiveTime,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub proposed_date: Option<NaiveDate>,
    #[serde(default, with = "clock::option")]
    pub proposed_time: Option<NaiveTime>,
    #[serde(default, with = "clock::option")]
    pub proposed_end_time: Option<NaiveTime>,
    pub status: RequestStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub declined_by: Option<DeclinedBy>,
    #[serde(default)]
    pub decline_reason: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppointmentRequest {
    /// A proposal counts as pending when the status says so or when any
    /// proposed field survived a write that could not set the status.
    pub fn has_pending_proposal(&self) -> bool {
        self.status == RequestStatus::Proposed
            || self.proposed_date.is_some()
            || self.proposed_time.is_some()
            || self.proposed_end_time.is_some()
    }

    pub fn requested_slot(&self) -> ScheduleSlot {
        ScheduleSlot {
            date: self.date,
            time: self.time,
            end_time: self.end_time,
        }
    }

    /// Proposed values where present, the original request otherwise.
    pub fn effective_slot(&self) -> ScheduleSlot {
        ScheduleSlot {
            date: self.proposed_date.unwrap_or(self.date),
            time: self.proposed_time.unwrap_or(self.time),
            end_time: self.proposed_end_time.or(self.end_time),
        }
    }
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Originating request; unique, so a request materializes at most once.
    #[serde(default)]
    pub request_id: Option<Uuid>,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub time: NaiveTime,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder_24h_sent: bool,
    #[serde(default)]
    pub reminder_2h_sent: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn slot(&self) -> ScheduleSlot {
        ScheduleSlot {
            date: self.date,
            time: self.time,
            end_time: self.end_time,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRequest {
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub time: NaiveTime,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
}

impl ProposeRequest {
    pub fn slot(&self) -> ScheduleSlot {
        ScheduleSlot {
            date: self.date,
            time: self.time,
            end_time: self.end_time,
        }
    }
}

/// Clinic-supplied values layered over the stored request on approval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub clinic_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "clock::option")]
    pub time: Option<NaiveTime>,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl ApproveRequest {
    /// Explicit end time wins, then start + duration, then the stored end time
    /// if it still falls after the (possibly overridden) start.
    pub fn layer_over(&self, original: ScheduleSlot) -> Result<ScheduleSlot, AppointmentError> {
        let date = self.date.unwrap_or(original.date);
        let time = self.time.unwrap_or(original.time);

        let end_time = match (self.end_time, self.duration_minutes) {
            (Some(end), _) => Some(end),
            (None, Some(0)) => {
                return Err(AppointmentError::InvalidSchedule("duration must be at least one minute".to_string()))
            }
            (None, Some(minutes)) => {
                let (end, wrapped) = time.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
                if wrapped != 0 {
                    return Err(AppointmentError::InvalidSchedule(
                        "appointment must end on the day it starts".to_string(),
                    ));
                }
                Some(end)
            }
            (None, None) => original.end_time.filter(|end| *end > time),
        };

        let slot = ScheduleSlot { date, time, end_time };
        slot.validate()?;
        Ok(slot)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestOutcome {
    pub id: Uuid,
    pub status: RequestStatus,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment request {0} not found")]
    NotFound(Uuid),

    #[error("Cannot {action} a request in status {from}")]
    InvalidTransition { from: RequestStatus, action: &'static str },

    #[error("Appointment request {0} is already approved")]
    AlreadyApproved(Uuid),

    #[error("No pending proposal to accept")]
    NoPendingProposal,

    #[error("Clinic must be assigned before {0}")]
    MissingClinic(&'static str),

    #[error("Doctor must be assigned before approval")]
    MissingDoctor,

    #[error("No doctor available; clinic must assign one")]
    NoDoctorAvailable,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Could not resolve {0}")]
    Identity(#[from] IdentityError),

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(message),
            AppointmentError::InvalidTransition { .. }
            | AppointmentError::AlreadyApproved(_) => AppError::Conflict(message),
            AppointmentError::NoPendingProposal => AppError::Conflict(message),
            AppointmentError::MissingClinic(_)
            | AppointmentError::MissingDoctor
            | AppointmentError::NoDoctorAvailable
            | AppointmentError::InvalidSchedule(_) => AppError::ValidationError(message),
            AppointmentError::Identity(IdentityError::DatabaseError(e)) => AppError::Database(e),
            AppointmentError::Identity(_) => AppError::ValidationError(message),
            AppointmentError::Forbidden(_) => AppError::Forbidden(message),
            AppointmentError::SchemaError(_) | AppointmentError::DatabaseError(_) => AppError::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn request(value: serde_json::Value) -> AppointmentRequest {
        serde_json::from_value(value).unwrap()
    }

    fn pending() -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "date": "2025-03-10",
            "time": "09:00",
            "status": "pending"
        })
    }

    #[test]
    fn clock_accepts_seconds_and_writes_minutes() {
        assert_eq!(clock::parse("14:00:00").unwrap(), t(14, 0));
        assert!(clock::parse("2pm").is_err());

        let slot = ScheduleSlot { date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(), time: t(14, 0), end_time: None };
        let value = serde_json::to_value(slot).unwrap();
        assert_eq!(value["time"], "14:00");
        assert!(value["end_time"].is_null());
    }

    #[test]
    fn effective_slot_prefers_proposed_fields() {
        let mut raw = pending();
        raw["status"] = json!("proposed");
        raw["proposed_date"] = json!("2025-03-12");
        raw["proposed_time"] = json!("14:00");
        let req = request(raw);

        assert!(req.has_pending_proposal());
        let slot = req.effective_slot();
        assert_eq!(slot.date, NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(slot.time, t(14, 0));
        assert_eq!(req.requested_slot().time, t(9, 0));
    }

    #[test]
    fn proposal_detected_without_status() {
        let mut raw = pending();
        raw["proposed_time"] = json!("11:30");
        let req = request(raw);
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.has_pending_proposal());
        assert!(!request(pending()).has_pending_proposal());
    }

    #[test]
    fn blank_optional_times_read_as_none() {
        let mut raw = pending();
        raw["end_time"] = json!("");
        assert!(request(raw).end_time.is_none());
    }

    #[test]
    fn overrides_layer_over_original() {
        let original = ScheduleSlot { date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), time: t(9, 0), end_time: Some(t(9, 30)) };

        let kept = ApproveRequest::default().layer_over(original).unwrap();
        assert_eq!(kept, original);

        let moved = ApproveRequest { time: Some(t(15, 0)), ..Default::default() }.layer_over(original).unwrap();
        assert_eq!(moved.time, t(15, 0));
        assert_eq!(moved.end_time, None, "stale end time before new start is dropped");

        let sized = ApproveRequest { duration_minutes: Some(45), ..Default::default() }.layer_over(original).unwrap();
        assert_eq!(sized.end_time, Some(t(9, 45)));

        let explicit = ApproveRequest { end_time: Some(t(10, 0)), duration_minutes: Some(5), ..Default::default() }
            .layer_over(original)
            .unwrap();
        assert_eq!(explicit.end_time, Some(t(10, 0)));
    }

    #[test]
    fn overrides_reject_bad_ranges() {
        let original = ScheduleSlot { date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), time: t(23, 30), end_time: None };
        assert!(ApproveRequest { duration_minutes: Some(60), ..Default::default() }.layer_over(original).is_err());
        assert!(ApproveRequest { duration_minutes: Some(0), ..Default::default() }.layer_over(original).is_err());
        assert!(ApproveRequest { end_time: Some(t(8, 0)), ..Default::default() }.layer_over(original).is_err());
    }

    #[test]
    fn start_respects_clinic_offset() {
        let slot = ScheduleSlot { date: NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(), time: t(14, 0), end_time: None };
        let utc = slot.start_at(clinic_offset(0)).unwrap();
        let plus_one = slot.start_at(clinic_offset(60)).unwrap();
        assert_eq!(utc - plus_one, Duration::hours(1));
    }

    #[test]
    fn errors_map_to_http_kinds() {
        let conflict: AppError = AppointmentError::AlreadyApproved(Uuid::nil()).into();
        assert!(matches!(conflict, AppError::Conflict(_)));

        let missing: AppError = AppointmentError::MissingDoctor.into();
        assert!(matches!(missing, AppError::ValidationError(ref m) if m == "Doctor must be assigned before approval"));

        let not_found: AppError = AppointmentError::NotFound(Uuid::nil()).into();
        assert!(matches!(not_found, AppError::NotFound(_)));
    }
}
