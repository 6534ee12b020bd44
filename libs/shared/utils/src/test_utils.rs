use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, NotificationAudience};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub messaging_api_url: String,
    pub notification_audience: NotificationAudience,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            messaging_api_url: String::new(),
            notification_audience: NotificationAudience::Both,
        }
    }
}

impl TestConfig {
    /// Points both the database and the messaging API at one mock server.
    pub fn for_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            messaging_api_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            messaging_api_url: self.messaging_api_url.clone(),
            messaging_api_key: "test-messaging-key".to_string(),
            messaging_from_address: "clinic@example.com".to_string(),
            notification_audience: self.notification_audience,
            reminder_worker_enabled: false,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn clinic(email: &str) -> Self {
        Self::new(email, "clinic")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// PostgREST row fixtures for the tables the core reads.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_request_response(
        request_id: &str,
        patient_id: &str,
        clinic_id: Option<&str>,
        doctor_id: Option<&str>,
        status: &str,
    ) -> Value {
        json!({
            "id": request_id,
            "patient_id": patient_id,
            "clinic_id": clinic_id,
            "doctor_id": doctor_id,
            "target_doctor_email": null,
            "date": "2025-03-10",
            "time": "09:00",
            "end_time": null,
            "proposed_date": null,
            "proposed_time": null,
            "proposed_end_time": null,
            "status": status,
            "reason": "Check-up",
            "notes": "Sensitive upper molar",
            "created_at": "2025-03-01T10:00:00Z",
            "updated_at": "2025-03-01T10:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        request_id: Option<&str>,
        clinic_id: &str,
        doctor_id: &str,
        patient_id: &str,
        date: &str,
        time: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "request_id": request_id,
            "clinic_id": clinic_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "date": date,
            "time": time,
            "end_time": null,
            "status": "scheduled",
            "reason": "Check-up",
            "notes": null,
            "reminder_24h_sent": false,
            "reminder_2h_sent": false,
            "created_at": "2025-03-01T10:00:00Z"
        })
    }

    pub fn patient_response(patient_id: &str, user_id: Option<&str>, email: &str) -> Value {
        json!({
            "id": patient_id,
            "user_id": user_id,
            "email": email,
            "first_name": "Test",
            "last_name": "Patient",
            "phone_number": null
        })
    }

    pub fn doctor_response(doctor_id: &str, email: &str) -> Value {
        json!({
            "id": doctor_id,
            "user_id": null,
            "email": email,
            "first_name": "Dana",
            "last_name": "Dentist"
        })
    }

    pub fn clinic_doctor_response(
        membership_id: &str,
        clinic_id: &str,
        doctor_id: Option<&str>,
        email: &str,
        created_at: &str,
    ) -> Value {
        json!({
            "id": membership_id,
            "clinic_id": clinic_id,
            "doctor_id": doctor_id,
            "email": email,
            "first_name": "Dana",
            "last_name": "Dentist",
            "is_active": true,
            "created_at": created_at
        })
    }

    pub fn clinic_response(clinic_id: &str, owner_user_id: Option<&str>) -> Value {
        json!({
            "id": clinic_id,
            "name": "Bright Smile Dental",
            "email": "front-desk@brightsmile.test",
            "owner_user_id": owner_user_id
        })
    }
}
