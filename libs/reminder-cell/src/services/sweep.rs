use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use appointment_cell::models::clinic_offset;
use appointment_cell::Appointment;
use identity_cell::IdentityResolver;
use messaging_cell::{AppointmentSummary, Notifier, Recipient};
use shared_config::AppConfig;
use shared_database::supabase::{representation_headers, SupabaseClient};

use crate::error::ReminderError;
use crate::models::{ReminderWindow, SweepReport};
use crate::services::window::due_windows;

/// One pass over scheduled appointments.
///
/// A reminder is sent only by the caller whose conditional write flipped its
/// flag, so overlapping sweeps never send twice. A claimed flag stays set
/// even when every send fails: delivery is at most once.
pub struct ReminderSweepService {
    supabase: Arc<SupabaseClient>,
    resolver: IdentityResolver,
    notifier: Arc<Notifier>,
    offset: FixedOffset,
    service_token: String,
}

struct Contacts {
    patient: Recipient,
    doctor: Recipient,
    summary: AppointmentSummary,
}

impl ReminderSweepService {
    pub fn new(config: &AppConfig, notifier: Arc<Notifier>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            resolver: IdentityResolver::with_client(supabase.clone()),
            supabase,
            notifier,
            offset: clinic_offset(config.clinic_utc_offset_minutes),
            service_token: config.service_token().to_string(),
        }
    }

    pub async fn run_once(&self) -> Result<SweepReport, ReminderError> {
        self.run_once_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<SweepReport, ReminderError> {
        let appointments = self.load_candidates(now).await?;
        let mut report = SweepReport::default();

        for appointment in &appointments {
            report.scanned += 1;
            let windows = due_windows(appointment, now, self.offset);
            if windows.is_empty() {
                continue;
            }

            let contacts = match self.contacts(appointment).await {
                Ok(contacts) => contacts,
                Err(e) => {
                    warn!("Skipping reminders for appointment {}: {}", appointment.id, e);
                    report.errors += 1;
                    continue;
                }
            };

            for window in windows {
                match self.claim(appointment, window).await {
                    Ok(true) => {
                        report.record_claim(window);
                        let delivery = self
                            .notifier
                            .reminder(window.message_kind(), &contacts.patient, &contacts.doctor, &contacts.summary)
                            .await;
                        report.messages_sent += delivery.delivered;
                        report.messages_failed += delivery.failed;
                    }
                    Ok(false) => debug!("{} reminder for {} already claimed", window, appointment.id),
                    Err(e) => {
                        warn!("Failed to claim {} reminder for {}: {}", window, appointment.id, e);
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            "Reminder sweep: scanned {}, sent {} x 24h and {} x 2h ({} messages, {} failed, {} errors)",
            report.scanned,
            report.reminders_24h_sent,
            report.reminders_2h_sent,
            report.messages_sent,
            report.messages_failed,
            report.errors
        );
        Ok(report)
    }

    /// Scheduled appointments with an unsent reminder whose date can still
    /// fall inside a window.
    async fn load_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, ReminderError> {
        let local_now = now.with_timezone(&self.offset);
        let from = local_now.date_naive();
        let (_, widest) = ReminderWindow::DayBefore.bounds();
        let until = (local_now + widest + Duration::days(1)).date_naive();

        let path = format!(
            "/rest/v1/appointments?status=eq.scheduled&or=(reminder_24h_sent.eq.false,reminder_2h_sent.eq.false)&date=gte.{}&date=lte.{}&order=date.asc,time.asc",
            from.format("%Y-%m-%d"),
            until.format("%Y-%m-%d")
        );

        self.supabase
            .request::<Vec<Appointment>>(Method::GET, &path, Some(&self.service_token), None)
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))
    }

    async fn contacts(&self, appointment: &Appointment) -> Result<Contacts, ReminderError> {
        let patient = self
            .resolver
            .resolve_patient(appointment.patient_id, Some(appointment.clinic_id), &self.service_token)
            .await?;
        let doctor = self
            .resolver
            .resolve_doctor(appointment.doctor_id, Some(appointment.clinic_id), &self.service_token)
            .await?;
        let clinic_name = match self.resolver.resolve_clinic(appointment.clinic_id, &self.service_token).await {
            Ok(clinic) => Some(clinic.name),
            Err(e) => {
                debug!("Clinic {} unavailable for reminder text: {}", appointment.clinic_id, e);
                None
            }
        };

        Ok(Contacts {
            summary: AppointmentSummary {
                date: appointment.date,
                time: appointment.time,
                end_time: appointment.end_time,
                clinic_name,
                doctor_name: Some(doctor.display_name.clone()),
                patient_name: Some(patient.display_name.clone()),
                reason: appointment.reason.clone(),
            },
            patient: Recipient::new(patient.email, patient.display_name),
            doctor: Recipient::new(doctor.email, doctor.display_name),
        })
    }

    /// Flips the window's flag if nobody else has. True means this caller
    /// owns the send.
    async fn claim(&self, appointment: &Appointment, window: ReminderWindow) -> Result<bool, ReminderError> {
        let column = window.flag_column();
        let path = format!("/rest/v1/appointments?id=eq.{}&{}=eq.false", appointment.id, column);

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.service_token),
                Some(json!({ column: true })),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| ReminderError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
