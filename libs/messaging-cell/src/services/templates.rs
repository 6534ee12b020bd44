use uuid::Uuid;

use crate::models::{AppointmentSummary, MessageKind, NotificationRecord, OutboundMessage, RecipientKind};

fn slot(summary: &AppointmentSummary) -> String {
    let start = summary.time.format("%H:%M");
    match summary.end_time {
        Some(end) => format!("{} {}-{}", summary.date.format("%Y-%m-%d"), start, end.format("%H:%M")),
        None => format!("{} at {}", summary.date.format("%Y-%m-%d"), start),
    }
}

fn at_clinic(summary: &AppointmentSummary) -> String {
    summary
        .clinic_name
        .as_deref()
        .map(|name| format!(" at {}", name))
        .unwrap_or_default()
}

fn with_doctor(summary: &AppointmentSummary) -> String {
    summary
        .doctor_name
        .as_deref()
        .map(|name| format!(" with {}", name))
        .unwrap_or_default()
}

pub fn compose(kind: MessageKind, to: &str, greeting: &str, summary: &AppointmentSummary) -> OutboundMessage {
    let when = slot(summary);
    let (subject, lead) = match kind {
        MessageKind::ProposalOffered => (
            "A new time was proposed for your appointment".to_string(),
            format!(
                "The clinic{} proposed {} for your appointment request. Please accept it or decline it in the app.",
                at_clinic(summary),
                when
            ),
        ),
        MessageKind::AppointmentCreated => (
            "Appointment confirmed".to_string(),
            format!("Your appointment{}{} is confirmed for {}.", at_clinic(summary), with_doctor(summary), when),
        ),
        MessageKind::PatientAccepted => (
            "Patient accepted the proposed time".to_string(),
            format!(
                "{} accepted the proposed time {}.",
                summary.patient_name.as_deref().unwrap_or("The patient"),
                when
            ),
        ),
        MessageKind::RequestDeclined => (
            "Appointment request declined".to_string(),
            format!("The appointment request for {} was declined.", when),
        ),
        MessageKind::Reminder24h => (
            "Reminder: appointment tomorrow".to_string(),
            format!("This is a reminder of your appointment{}{} on {}.", at_clinic(summary), with_doctor(summary), when),
        ),
        MessageKind::Reminder2h => (
            "Reminder: appointment in 2 hours".to_string(),
            format!("Your appointment{}{} starts soon ({}).", at_clinic(summary), with_doctor(summary), when),
        ),
    };

    let mut body = format!("Hello {},\n\n{}", greeting, lead);
    if let Some(reason) = summary.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        body.push_str(&format!("\nReason: {}", reason));
    }

    OutboundMessage {
        to: to.to_string(),
        subject,
        body,
        kind,
    }
}

/// In-app feed entry carrying the same wording as the outbound message.
pub fn feed_entry(
    kind: MessageKind,
    recipient_id: Uuid,
    recipient_kind: RecipientKind,
    greeting: &str,
    summary: &AppointmentSummary,
    appointment_request_id: Option<Uuid>,
) -> NotificationRecord {
    let message = compose(kind, "", greeting, summary);
    NotificationRecord {
        recipient_id,
        recipient_kind,
        kind,
        title: message.subject,
        message: message.body,
        appointment_request_id,
    }
}
