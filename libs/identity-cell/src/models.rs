use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// RAW ROWS (one per identity table)
// ==============================================================================

/// Account-level patient identity (`patients`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Clinic-membership-scoped patient identity (`clinic_patients`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicPatientRecord {
    pub id: Uuid,
    pub clinic_id: Uuid,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Account-level doctor identity (`doctors`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Staff membership of a doctor in a clinic (`clinic_doctors`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicDoctorRecord {
    pub id: Uuid,
    pub clinic_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub owner_user_id: Option<String>,
}

// ==============================================================================
// CANONICAL IDENTITIES
// ==============================================================================

/// One identity per patient, whichever table it was found in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPatient {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDoctor {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalClinic {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub owner_user_id: Option<String>,
}

impl CanonicalPatient {
    /// True when the authenticated account is this patient.
    pub fn is_account(&self, user_id: &str, user_email: Option<&str>) -> bool {
        if self.user_id.as_deref() == Some(user_id) || self.id.to_string() == user_id {
            return true;
        }
        match (self.email.as_deref(), user_email.and_then(normalize_address)) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

impl From<PatientRecord> for CanonicalPatient {
    fn from(record: PatientRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            email: record.email.as_deref().and_then(normalize_address),
            display_name: display_name(record.first_name.as_deref(), record.last_name.as_deref(), "Patient"),
        }
    }
}

impl From<ClinicPatientRecord> for CanonicalPatient {
    fn from(record: ClinicPatientRecord) -> Self {
        Self {
            id: record.id,
            user_id: None,
            email: record.email.as_deref().and_then(normalize_address),
            display_name: display_name(record.first_name.as_deref(), record.last_name.as_deref(), "Patient"),
        }
    }
}

impl From<DoctorRecord> for CanonicalDoctor {
    fn from(record: DoctorRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            email: record.email.as_deref().and_then(normalize_address),
            display_name: display_name(record.first_name.as_deref(), record.last_name.as_deref(), "Doctor"),
        }
    }
}

impl From<ClinicDoctorRecord> for CanonicalDoctor {
    fn from(record: ClinicDoctorRecord) -> Self {
        Self {
            id: record.id,
            user_id: None,
            email: record.email.as_deref().and_then(normalize_address),
            display_name: display_name(record.first_name.as_deref(), record.last_name.as_deref(), "Doctor"),
        }
    }
}

impl From<ClinicRecord> for CanonicalClinic {
    fn from(record: ClinicRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email.as_deref().and_then(normalize_address),
            owner_user_id: record.owner_user_id,
        }
    }
}

/// Contact addresses compare trimmed and lowercased; blank means absent.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn display_name(first: Option<&str>, last: Option<&str>, fallback: &str) -> String {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

// ==============================================================================
// LOOKUP INPUT / OUTPUT
// ==============================================================================

/// Loosely-typed references to the parties of an appointment.
#[derive(Debug, Clone, Default)]
pub struct PartyReference {
    pub patient: Option<Uuid>,
    pub doctor: Option<Uuid>,
    pub clinic: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ResolvedParties {
    pub patient: Option<CanonicalPatient>,
    pub doctor: Option<CanonicalDoctor>,
    pub clinic: Option<CanonicalClinic>,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("Clinic {0} not found")]
    ClinicNotFound(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_normalize() {
        assert_eq!(normalize_address("  Dr.Who@Clinic.IE "), Some("dr.who@clinic.ie".to_string()));
        assert_eq!(normalize_address("   "), None);
    }

    #[test]
    fn display_name_skips_blanks() {
        assert_eq!(display_name(Some("Ana"), Some(" "), "Patient"), "Ana");
        assert_eq!(display_name(None, None, "Doctor"), "Doctor");
        assert_eq!(display_name(Some("Ana"), Some("Lopez"), "Patient"), "Ana Lopez");
    }

    #[test]
    fn patient_account_match_uses_user_id_then_email() {
        let patient = CanonicalPatient {
            id: Uuid::new_v4(),
            user_id: Some("auth-1".into()),
            email: Some("ana@example.com".into()),
            display_name: "Ana".into(),
        };
        assert!(patient.is_account("auth-1", None));
        assert!(patient.is_account("other", Some("ANA@example.com")));
        assert!(!patient.is_account("other", Some("bob@example.com")));
    }
}
