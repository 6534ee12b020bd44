use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Who receives appointment notifications and reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAudience {
    Patient,
    Doctor,
    Both,
}

impl NotificationAudience {
    pub fn includes_patient(&self) -> bool {
        matches!(self, NotificationAudience::Patient | NotificationAudience::Both)
    }

    pub fn includes_doctor(&self) -> bool {
        matches!(self, NotificationAudience::Doctor | NotificationAudience::Both)
    }
}

impl FromStr for NotificationAudience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(NotificationAudience::Patient),
            "doctor" => Ok(NotificationAudience::Doctor),
            "both" | "all" => Ok(NotificationAudience::Both),
            other => Err(format!("unknown notification audience '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub messaging_api_url: String,
    pub messaging_api_key: String,
    pub messaging_from_address: String,
    pub notification_audience: NotificationAudience,
    pub reminder_sweep_interval_seconds: u64,
    pub reminder_cron_secret: Option<String>,
    pub reminder_worker_enabled: bool,
    pub clinic_utc_offset_minutes: i32,
    /// Forces the propose write path instead of probing the schema at startup.
    pub appointment_request_schema: Option<String>,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            messaging_api_url: String::new(),
            messaging_api_key: String::new(),
            messaging_from_address: "no-reply@clinic.local".to_string(),
            notification_audience: NotificationAudience::Both,
            reminder_sweep_interval_seconds: 300,
            reminder_cron_secret: None,
            reminder_worker_enabled: true,
            clinic_utc_offset_minutes: 0,
            appointment_request_schema: None,
            server_port: 3000,
        }
    }
}

fn required(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let notification_audience = match optional("NOTIFICATION_AUDIENCE") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!("{}, notifying both patient and doctor", e);
                NotificationAudience::Both
            }),
            None => defaults.notification_audience,
        };

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            messaging_api_url: optional("MESSAGING_API_URL").unwrap_or_else(|| {
                warn!("MESSAGING_API_URL not set, outbound messages will only be logged");
                String::new()
            }),
            messaging_api_key: optional("MESSAGING_API_KEY").unwrap_or_default(),
            messaging_from_address: optional("MESSAGING_FROM_ADDRESS")
                .unwrap_or(defaults.messaging_from_address),
            notification_audience,
            reminder_sweep_interval_seconds: parsed(
                "REMINDER_SWEEP_INTERVAL_SECONDS",
                defaults.reminder_sweep_interval_seconds,
            ),
            reminder_cron_secret: optional("REMINDER_CRON_SECRET"),
            reminder_worker_enabled: parsed("REMINDER_WORKER_ENABLED", defaults.reminder_worker_enabled),
            clinic_utc_offset_minutes: parsed(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            appointment_request_schema: optional("APPOINTMENT_REQUEST_SCHEMA"),
            server_port: parsed("SERVER_PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_messaging_configured(&self) -> bool {
        !self.messaging_api_url.is_empty()
    }

    /// Token used by background jobs that run without a caller's JWT.
    pub fn service_token(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}
