// libs/appointment-cell/src/services/context.rs
use std::sync::Arc;

use tracing::{debug, info};

use identity_cell::{CanonicalClinic, CanonicalDoctor, CanonicalPatient, IdentityResolver};
use messaging_cell::AppointmentSummary;

use crate::models::{Appointment, AppointmentError, AppointmentRequest, ApproveRequest, ScheduleSlot};

/// Where the doctor of a completed context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorSource {
    Assigned,
    TargetEmail,
    EarliestActive,
}

/// Fully resolved input for materialization. Every id is canonical.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    pub clinic: CanonicalClinic,
    pub doctor: CanonicalDoctor,
    pub patient: CanonicalPatient,
    pub slot: ScheduleSlot,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub doctor_source: DoctorSource,
}

impl SchedulingContext {
    pub fn summary(&self) -> AppointmentSummary {
        AppointmentSummary {
            date: self.slot.date,
            time: self.slot.time,
            end_time: self.slot.end_time,
            clinic_name: Some(self.clinic.name.clone()),
            doctor_name: Some(self.doctor.display_name.clone()),
            patient_name: Some(self.patient.display_name.clone()),
            reason: self.reason.clone(),
        }
    }
}

/// Completes a request into a `SchedulingContext`. The patient and clinic
/// are never guessed; only acceptance may default the doctor.
pub struct ContextCompletionService {
    resolver: Arc<IdentityResolver>,
}

impl ContextCompletionService {
    pub fn new(resolver: Arc<IdentityResolver>) -> Self {
        Self { resolver }
    }

    pub async fn complete_for_approval(
        &self,
        request: &AppointmentRequest,
        overrides: &ApproveRequest,
        auth_token: &str,
    ) -> Result<SchedulingContext, AppointmentError> {
        let clinic_ref = overrides
            .clinic_id
            .or(request.clinic_id)
            .ok_or(AppointmentError::MissingClinic("approval"))?;
        let doctor_ref = overrides.doctor_id.or(request.doctor_id).ok_or(AppointmentError::MissingDoctor)?;
        let slot = overrides.layer_over(request.requested_slot())?;

        let clinic = self.resolver.resolve_clinic(clinic_ref, auth_token).await?;
        let patient = self.resolver.resolve_patient(request.patient_id, Some(clinic.id), auth_token).await?;
        let doctor = self.resolver.resolve_doctor(doctor_ref, Some(clinic.id), auth_token).await?;

        debug!("Approval context for request {}: clinic {}, doctor {}", request.id, clinic.id, doctor.id);

        Ok(SchedulingContext {
            clinic,
            doctor,
            patient,
            slot,
            reason: request.reason.clone(),
            notes: request.notes.clone(),
            doctor_source: DoctorSource::Assigned,
        })
    }

    pub async fn complete_for_acceptance(
        &self,
        request: &AppointmentRequest,
        auth_token: &str,
    ) -> Result<SchedulingContext, AppointmentError> {
        let slot = request.effective_slot();
        slot.validate()?;

        let clinic_ref = request.clinic_id.ok_or(AppointmentError::MissingClinic("acceptance"))?;
        let clinic = self.resolver.resolve_clinic(clinic_ref, auth_token).await?;
        let patient = self.resolver.resolve_patient(request.patient_id, Some(clinic.id), auth_token).await?;
        let (doctor, doctor_source) = self.choose_doctor(request, &clinic, auth_token).await?;

        if doctor_source != DoctorSource::Assigned {
            info!("Request {} accepted without a doctor; using {} ({:?})", request.id, doctor.id, doctor_source);
        }

        Ok(SchedulingContext {
            clinic,
            doctor,
            patient,
            slot,
            reason: request.reason.clone(),
            notes: request.notes.clone(),
            doctor_source,
        })
    }

    /// Rebases `context` onto the appointment an earlier attempt already
    /// materialized for the request. The stored row wins for parties and slot.
    pub async fn align_with_existing(
        &self,
        mut context: SchedulingContext,
        existing: &Appointment,
        auth_token: &str,
    ) -> Result<SchedulingContext, AppointmentError> {
        if existing.clinic_id != context.clinic.id {
            context.clinic = self.resolver.resolve_clinic(existing.clinic_id, auth_token).await?;
        }
        if existing.patient_id != context.patient.id {
            context.patient = self
                .resolver
                .resolve_patient(existing.patient_id, Some(context.clinic.id), auth_token)
                .await?;
        }
        if existing.doctor_id != context.doctor.id {
            context.doctor = self
                .resolver
                .resolve_doctor(existing.doctor_id, Some(context.clinic.id), auth_token)
                .await?;
            context.doctor_source = DoctorSource::Assigned;
        }
        if existing.slot() != context.slot {
            info!(
                "Appointment {} keeps its stored slot {} {}",
                existing.id,
                existing.date,
                existing.time.format("%H:%M")
            );
            context.slot = existing.slot();
        }
        context.reason = existing.reason.clone().or(context.reason);
        context.notes = existing.notes.clone().or(context.notes);

        Ok(context)
    }

    /// Stored doctor, then the targeted contact address within the clinic,
    /// then the clinic's earliest-created active doctor.
    async fn choose_doctor(
        &self,
        request: &AppointmentRequest,
        clinic: &CanonicalClinic,
        auth_token: &str,
    ) -> Result<(CanonicalDoctor, DoctorSource), AppointmentError> {
        if let Some(doctor_id) = request.doctor_id {
            let doctor = self.resolver.resolve_doctor(doctor_id, Some(clinic.id), auth_token).await?;
            return Ok((doctor, DoctorSource::Assigned));
        }

        if let Some(address) = request.target_doctor_email.as_deref() {
            if let Some(doctor) = self.resolver.find_doctor_by_email(address, clinic.id, auth_token).await? {
                return Ok((doctor, DoctorSource::TargetEmail));
            }
            debug!("No active doctor of clinic {} at {}", clinic.id, address);
        }

        match self.resolver.first_active_doctor(clinic.id, auth_token).await? {
            Some(doctor) => Ok((doctor, DoctorSource::EarliestActive)),
            None => Err(AppointmentError::NoDoctorAvailable),
        }
    }
}
