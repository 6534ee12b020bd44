use std::sync::Arc;

use tracing::{debug, warn};

use shared_config::{AppConfig, NotificationAudience};

use crate::models::{AppointmentSummary, DeliveryReport, MessageKind, Recipient};
use crate::services::sink::{sink_from_config, MessagingSink};
use crate::services::templates::compose;

/// Best-effort fan-out of appointment messages.
///
/// The audience decides whether patient-and-doctor messages reach the patient,
/// the doctor or both. Sends to different recipients run concurrently and
/// are isolated: one failure is logged and never affects the other.
pub struct Notifier {
    sink: Arc<dyn MessagingSink>,
    audience: NotificationAudience,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessagingSink>, audience: NotificationAudience) -> Self {
        Self { sink, audience }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(sink_from_config(config), config.notification_audience)
    }

    pub fn audience(&self) -> NotificationAudience {
        self.audience
    }

    async fn deliver(&self, kind: MessageKind, recipient: &Recipient, summary: &AppointmentSummary) -> DeliveryReport {
        let Some(address) = recipient.address.as_deref() else {
            debug!("Skipping {} message for {}: no contact address", kind, recipient.name);
            return DeliveryReport { skipped: 1, ..DeliveryReport::default() };
        };

        let message = compose(kind, address, &recipient.name, summary);
        match self.sink.send(message).await {
            Ok(()) => DeliveryReport { delivered: 1, ..DeliveryReport::default() },
            Err(e) => {
                warn!("Failed to send {} message to {}: {}", kind, address, e);
                DeliveryReport { failed: 1, ..DeliveryReport::default() }
            }
        }
    }

    async fn deliver_to_audience(
        &self,
        kind: MessageKind,
        patient: &Recipient,
        doctor: &Recipient,
        summary: &AppointmentSummary,
    ) -> DeliveryReport {
        let to_patient = async {
            if self.audience.includes_patient() {
                self.deliver(kind, patient, summary).await
            } else {
                DeliveryReport::default()
            }
        };
        let to_doctor = async {
            if self.audience.includes_doctor() {
                self.deliver(kind, doctor, summary).await
            } else {
                DeliveryReport::default()
            }
        };

        let (mut report, doctor_report) = futures::join!(to_patient, to_doctor);
        report.merge(doctor_report);
        report
    }

    /// Patient-facing; a proposal always needs the patient's answer.
    pub async fn proposal_offered(&self, patient: &Recipient, summary: &AppointmentSummary) -> DeliveryReport {
        self.deliver(MessageKind::ProposalOffered, patient, summary).await
    }

    pub async fn appointment_created(
        &self,
        patient: &Recipient,
        doctor: &Recipient,
        summary: &AppointmentSummary,
    ) -> DeliveryReport {
        self.deliver_to_audience(MessageKind::AppointmentCreated, patient, doctor, summary).await
    }

    pub async fn patient_accepted(&self, doctor: &Recipient, summary: &AppointmentSummary) -> DeliveryReport {
        if !self.audience.includes_doctor() {
            return DeliveryReport::default();
        }
        self.deliver(MessageKind::PatientAccepted, doctor, summary).await
    }

    pub async fn request_declined(&self, recipient: &Recipient, summary: &AppointmentSummary) -> DeliveryReport {
        self.deliver(MessageKind::RequestDeclined, recipient, summary).await
    }

    pub async fn reminder(
        &self,
        kind: MessageKind,
        patient: &Recipient,
        doctor: &Recipient,
        summary: &AppointmentSummary,
    ) -> DeliveryReport {
        self.deliver_to_audience(kind, patient, doctor, summary).await
    }
}
