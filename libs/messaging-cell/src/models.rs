use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ProposalOffered,
    AppointmentCreated,
    PatientAccepted,
    RequestDeclined,
    #[serde(rename = "reminder_24h")]
    Reminder24h,
    #[serde(rename = "reminder_2h")]
    Reminder2h,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::ProposalOffered => write!(f, "proposal_offered"),
            MessageKind::AppointmentCreated => write!(f, "appointment_created"),
            MessageKind::PatientAccepted => write!(f, "patient_accepted"),
            MessageKind::RequestDeclined => write!(f, "request_declined"),
            MessageKind::Reminder24h => write!(f, "reminder_24h"),
            MessageKind::Reminder2h => write!(f, "reminder_2h"),
        }
    }
}

/// "Send this to address X"; the sink decides the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub kind: MessageKind,
}

/// A party that may receive a message. No address means nothing is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub address: Option<String>,
    pub name: String,
}

impl Recipient {
    pub fn new(address: Option<String>, name: impl Into<String>) -> Self {
        Self { address, name: name.into() }
    }
}

/// The appointment facts every template needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentSummary {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub clinic_name: Option<String>,
    pub doctor_name: Option<String>,
    pub patient_name: Option<String>,
    pub reason: Option<String>,
}

/// Outcome of a best-effort fan-out. Never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivered: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn attempted(&self) -> u32 {
        self.delivered + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    Patient,
    Doctor,
    Clinic,
}

/// Row written to the externally rendered `notifications` feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub recipient_id: Uuid,
    pub recipient_kind: RecipientKind,
    pub kind: MessageKind,
    pub title: String,
    pub message: String,
    pub appointment_request_id: Option<Uuid>,
}

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Messaging is not configured")]
    NotConfigured,

    #[error("Message delivery failed ({status}): {message}")]
    Delivery { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
