use chrono::{DateTime, FixedOffset, Utc};

use appointment_cell::{Appointment, AppointmentStatus};

use crate::models::ReminderWindow;

/// Windows an appointment is inside at `now` whose flag is still unset.
/// Only scheduled appointments get reminders.
pub fn due_windows(appointment: &Appointment, now: DateTime<Utc>, offset: FixedOffset) -> Vec<ReminderWindow> {
    if appointment.status != AppointmentStatus::Scheduled {
        return Vec::new();
    }
    let Some(start) = appointment.slot().start_at(offset) else {
        return Vec::new();
    };
    let lead = start - now;

    ReminderWindow::ALL
        .into_iter()
        .filter(|window| !already_sent(appointment, *window))
        .filter(|window| window.contains(lead))
        .collect()
}

fn already_sent(appointment: &Appointment, window: ReminderWindow) -> bool {
    match window {
        ReminderWindow::DayBefore => appointment.reminder_24h_sent,
        ReminderWindow::TwoHoursBefore => appointment.reminder_2h_sent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointment_cell::models::clinic_offset;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn starting_at(start: DateTime<Utc>) -> Appointment {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "request_id": null,
            "clinic_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "date": start.format("%Y-%m-%d").to_string(),
            "time": start.format("%H:%M").to_string(),
            "status": "scheduled",
            "reminder_24h_sent": false,
            "reminder_2h_sent": false
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 11, 14, 0, 0).unwrap()
    }

    #[test]
    fn day_before_window_only() {
        let appointment = starting_at(now() + Duration::hours(24) + Duration::minutes(1));
        assert_eq!(due_windows(&appointment, now(), clinic_offset(0)), vec![ReminderWindow::DayBefore]);
    }

    #[test]
    fn twenty_five_hours_out_is_too_early() {
        let appointment = starting_at(now() + Duration::hours(25));
        assert!(due_windows(&appointment, now(), clinic_offset(0)).is_empty());
    }

    #[test]
    fn two_hour_window_bounds() {
        let at_lower = starting_at(now() + Duration::minutes(110));
        let at_upper = starting_at(now() + Duration::minutes(130));
        assert_eq!(due_windows(&at_lower, now(), clinic_offset(0)), vec![ReminderWindow::TwoHoursBefore]);
        assert!(due_windows(&at_upper, now(), clinic_offset(0)).is_empty());
    }

    #[test]
    fn sent_flag_suppresses_window() {
        let mut appointment = starting_at(now() + Duration::hours(24));
        appointment.reminder_24h_sent = true;
        assert!(due_windows(&appointment, now(), clinic_offset(0)).is_empty());
    }

    #[test]
    fn clinic_offset_shifts_start() {
        // 16:00 wall clock at UTC+1 is 15:00 UTC, one hour from now.
        let appointment = starting_at(now() + Duration::hours(2));
        assert!(due_windows(&appointment, now(), clinic_offset(60)).is_empty());
        assert_eq!(
            due_windows(&appointment, now(), clinic_offset(0)),
            vec![ReminderWindow::TwoHoursBefore]
        );
    }

    #[test]
    fn cancelled_appointments_are_skipped() {
        let mut appointment = starting_at(now() + Duration::hours(24));
        appointment.status = AppointmentStatus::Cancelled;
        assert!(due_windows(&appointment, now(), clinic_offset(0)).is_empty());
    }
}
