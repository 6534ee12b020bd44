use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use messaging_cell::MessageKind;

/// A reminder offset before an appointment's start. Each window is
/// lower-inclusive and upper-exclusive on the time remaining until start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderWindow {
    #[serde(rename = "24h")]
    DayBefore,
    #[serde(rename = "2h")]
    TwoHoursBefore,
}

impl ReminderWindow {
    pub const ALL: [ReminderWindow; 2] = [ReminderWindow::DayBefore, ReminderWindow::TwoHoursBefore];

    pub fn bounds(&self) -> (Duration, Duration) {
        match self {
            ReminderWindow::DayBefore => (Duration::hours(23), Duration::hours(25)),
            ReminderWindow::TwoHoursBefore => (Duration::minutes(110), Duration::minutes(130)),
        }
    }

    pub fn width(&self) -> Duration {
        let (lower, upper) = self.bounds();
        upper - lower
    }

    pub fn contains(&self, lead: Duration) -> bool {
        let (lower, upper) = self.bounds();
        lead >= lower && lead < upper
    }

    /// Column on `appointments` that records this reminder went out.
    pub fn flag_column(&self) -> &'static str {
        match self {
            ReminderWindow::DayBefore => "reminder_24h_sent",
            ReminderWindow::TwoHoursBefore => "reminder_2h_sent",
        }
    }

    pub fn message_kind(&self) -> MessageKind {
        match self {
            ReminderWindow::DayBefore => MessageKind::Reminder24h,
            ReminderWindow::TwoHoursBefore => MessageKind::Reminder2h,
        }
    }
}

impl fmt::Display for ReminderWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderWindow::DayBefore => write!(f, "24h"),
            ReminderWindow::TwoHoursBefore => write!(f, "2h"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: u32,
    pub reminders_24h_sent: u32,
    pub reminders_2h_sent: u32,
    pub messages_sent: u32,
    pub messages_failed: u32,
    pub errors: u32,
}

impl SweepReport {
    pub fn record_claim(&mut self, window: ReminderWindow) {
        match window {
            ReminderWindow::DayBefore => self.reminders_24h_sent += 1,
            ReminderWindow::TwoHoursBefore => self.reminders_2h_sent += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub interval: std::time::Duration,
}

impl WorkerConfig {
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            interval: std::time::Duration::from_secs(seconds.max(1)),
        }
    }

    /// A window narrower than two intervals can be skipped entirely by one
    /// late tick.
    pub fn narrow_windows(&self) -> Vec<ReminderWindow> {
        let doubled = self.interval * 2;
        ReminderWindow::ALL
            .into_iter()
            .filter(|w| w.width().to_std().map(|width| width < doubled).unwrap_or(false))
            .collect()
    }
}
