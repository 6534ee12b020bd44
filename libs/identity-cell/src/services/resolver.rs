use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CanonicalClinic, CanonicalDoctor, CanonicalPatient, ClinicDoctorRecord,
    ClinicPatientRecord, ClinicRecord, DoctorRecord, IdentityError, PartyReference, PatientRecord,
    ResolvedParties,
};

/// Maps loosely-typed patient / doctor / clinic references to canonical
/// identities. Lookups go direct id first, then clinic membership, then
/// contact address; callers never learn which table matched.
pub struct IdentityResolver {
    supabase: Arc<SupabaseClient>,
}

fn eq(value: impl ToString) -> String {
    format!("eq.{}", urlencoding::encode(&value.to_string()))
}

/// Case-insensitive exact match on a contact address. LIKE wildcards are
/// escaped; PostgREST rewrites `*` unconditionally, so those addresses use `eq`.
fn same_address(raw: &str) -> Option<String> {
    let address = raw.trim();
    if address.is_empty() {
        return None;
    }
    if address.contains('*') {
        return Some(eq(address));
    }
    let escaped = address.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    Some(format!("ilike.{}", urlencoding::encode(&escaped)))
}

impl IdentityResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        modifiers: &str,
        auth_token: &str,
    ) -> Result<Vec<T>, IdentityError> {
        let query = filters
            .iter()
            .map(|(column, condition)| format!("{}={}", column, condition))
            .collect::<Vec<_>>()
            .join("&");
        let path = format!("/rest/v1/{}?{}{}", table, query, modifiers);

        self.supabase
            .request::<Vec<T>>(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| IdentityError::DatabaseError(e.to_string()))
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        auth_token: &str,
    ) -> Result<Option<T>, IdentityError> {
        let rows = self.select(table, filters, "&limit=1", auth_token).await?;
        Ok(rows.into_iter().next())
    }

    // ==========================================================================
    // PATIENTS
    // ==========================================================================

    pub async fn resolve_patient(
        &self,
        reference: Uuid,
        clinic_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<CanonicalPatient, IdentityError> {
        debug!("Resolving patient reference {}", reference);

        if let Some(patient) = self
            .select_one::<PatientRecord>("patients", &[("id", eq(reference))], auth_token)
            .await?
        {
            return Ok(patient.into());
        }

        let mut filters = vec![("id", eq(reference))];
        if let Some(clinic_id) = clinic_id {
            filters.push(("clinic_id", eq(clinic_id)));
        }

        match self
            .select_one::<ClinicPatientRecord>("clinic_patients", &filters, auth_token)
            .await?
        {
            Some(membership) => self.normalize_patient_membership(membership, auth_token).await,
            None => Err(IdentityError::PatientNotFound(reference)),
        }
    }

    async fn normalize_patient_membership(
        &self,
        membership: ClinicPatientRecord,
        auth_token: &str,
    ) -> Result<CanonicalPatient, IdentityError> {
        if let Some(patient_id) = membership.patient_id {
            if let Some(patient) = self
                .select_one::<PatientRecord>("patients", &[("id", eq(patient_id))], auth_token)
                .await?
            {
                return Ok(patient.into());
            }
        }

        if let Some(filter) = membership.email.as_deref().and_then(same_address) {
            if let Some(patient) = self
                .select_one::<PatientRecord>("patients", &[("email", filter)], auth_token)
                .await?
            {
                debug!("Clinic patient {} matched account {} by email", membership.id, patient.id);
                return Ok(patient.into());
            }
        }

        Ok(membership.into())
    }

    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    pub async fn resolve_doctor(
        &self,
        reference: Uuid,
        clinic_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<CanonicalDoctor, IdentityError> {
        debug!("Resolving doctor reference {}", reference);

        if let Some(doctor) = self
            .select_one::<DoctorRecord>("doctors", &[("id", eq(reference))], auth_token)
            .await?
        {
            return Ok(doctor.into());
        }

        let mut filters = vec![("id", eq(reference))];
        if let Some(clinic_id) = clinic_id {
            filters.push(("clinic_id", eq(clinic_id)));
        }

        match self
            .select_one::<ClinicDoctorRecord>("clinic_doctors", &filters, auth_token)
            .await?
        {
            Some(membership) => self.normalize_doctor_membership(membership, auth_token).await,
            None => Err(IdentityError::DoctorNotFound(reference)),
        }
    }

    async fn normalize_doctor_membership(
        &self,
        membership: ClinicDoctorRecord,
        auth_token: &str,
    ) -> Result<CanonicalDoctor, IdentityError> {
        if let Some(doctor_id) = membership.doctor_id {
            if let Some(doctor) = self
                .select_one::<DoctorRecord>("doctors", &[("id", eq(doctor_id))], auth_token)
                .await?
            {
                return Ok(doctor.into());
            }
        }

        if let Some(filter) = membership.email.as_deref().and_then(same_address) {
            if let Some(doctor) = self
                .select_one::<DoctorRecord>("doctors", &[("email", filter)], auth_token)
                .await?
            {
                return Ok(doctor.into());
            }
        }

        Ok(membership.into())
    }

    /// Active staff member of `clinic_id` reachable at `address`.
    pub async fn find_doctor_by_email(
        &self,
        address: &str,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<CanonicalDoctor>, IdentityError> {
        let Some(filter) = same_address(address) else {
            return Ok(None);
        };

        let membership = self
            .select_one::<ClinicDoctorRecord>(
                "clinic_doctors",
                &[
                    ("clinic_id", eq(clinic_id)),
                    ("email", filter),
                    ("is_active", "eq.true".to_string()),
                ],
                auth_token,
            )
            .await?;

        match membership {
            Some(membership) => Ok(Some(self.normalize_doctor_membership(membership, auth_token).await?)),
            None => Ok(None),
        }
    }

    /// Earliest-created active doctor of the clinic; ties broken by id.
    pub async fn first_active_doctor(
        &self,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<CanonicalDoctor>, IdentityError> {
        let rows = self
            .select::<ClinicDoctorRecord>(
                "clinic_doctors",
                &[("clinic_id", eq(clinic_id)), ("is_active", "eq.true".to_string())],
                "&order=created_at.asc,id.asc&limit=1",
                auth_token,
            )
            .await?;

        match rows.into_iter().next() {
            Some(membership) => {
                info!("Defaulting to earliest active doctor {} of clinic {}", membership.id, clinic_id);
                Ok(Some(self.normalize_doctor_membership(membership, auth_token).await?))
            }
            None => Ok(None),
        }
    }

    // ==========================================================================
    // CLINICS
    // ==========================================================================

    /// A clinic is referenced by its own id or by its owner's account id.
    pub async fn resolve_clinic(
        &self,
        reference: Uuid,
        auth_token: &str,
    ) -> Result<CanonicalClinic, IdentityError> {
        if let Some(clinic) = self
            .select_one::<ClinicRecord>("clinics", &[("id", eq(reference))], auth_token)
            .await?
        {
            return Ok(clinic.into());
        }

        self.select_one::<ClinicRecord>("clinics", &[("owner_user_id", eq(reference))], auth_token)
            .await?
            .map(CanonicalClinic::from)
            .ok_or(IdentityError::ClinicNotFound(reference))
    }

    /// Resolves whatever references are present. The clinic goes first so the
    /// patient and doctor lookups can be scoped to it.
    pub async fn resolve_parties(
        &self,
        reference: &PartyReference,
        auth_token: &str,
    ) -> Result<ResolvedParties, IdentityError> {
        let clinic = match reference.clinic {
            Some(id) => Some(self.resolve_clinic(id, auth_token).await?),
            None => None,
        };
        let clinic_id = clinic.as_ref().map(|c| c.id);

        let patient = match reference.patient {
            Some(id) => Some(self.resolve_patient(id, clinic_id, auth_token).await?),
            None => None,
        };

        let doctor = match reference.doctor {
            Some(id) => Some(self.resolve_doctor(id, clinic_id, auth_token).await?),
            None => None,
        };

        Ok(ResolvedParties { patient, doctor, clinic })
    }
}
