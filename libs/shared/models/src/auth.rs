use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Role claim carried in the access token. Anything unrecognised is treated
/// as a patient, the least privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Patient,
    Doctor,
    Clinic,
    Staff,
    Admin,
}

impl CallerRole {
    pub fn from_claim(role: Option<&str>) -> Self {
        match role.map(|r| r.to_ascii_lowercase()).as_deref() {
            Some("admin") => CallerRole::Admin,
            Some("clinic") | Some("clinic_admin") => CallerRole::Clinic,
            Some("staff") | Some("receptionist") => CallerRole::Staff,
            Some("doctor") => CallerRole::Doctor,
            _ => CallerRole::Patient,
        }
    }

    pub fn is_clinic_staff(&self) -> bool {
        matches!(self, CallerRole::Clinic | CallerRole::Staff | CallerRole::Doctor | CallerRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn caller_role(&self) -> CallerRole {
        CallerRole::from_claim(self.role.as_deref())
    }

    pub fn is_admin(&self) -> bool {
        self.caller_role() == CallerRole::Admin
    }

    /// Case-insensitive comparison against the token's email claim.
    pub fn has_email(&self, address: &str) -> bool {
        self.email
            .as_deref()
            .map(|e| e.trim().eq_ignore_ascii_case(address.trim()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<&str>, email: Option<&str>) -> User {
        User {
            id: "u1".into(),
            email: email.map(str::to_string),
            role: role.map(str::to_string),
            metadata: None,
            created_at: None,
        }
    }

    #[test]
    fn roles_map_from_claims() {
        assert_eq!(user(Some("ADMIN"), None).caller_role(), CallerRole::Admin);
        assert_eq!(user(Some("receptionist"), None).caller_role(), CallerRole::Staff);
        assert_eq!(user(Some("authenticated"), None).caller_role(), CallerRole::Patient);
        assert_eq!(user(None, None).caller_role(), CallerRole::Patient);
        assert!(CallerRole::Doctor.is_clinic_staff());
        assert!(!CallerRole::Patient.is_clinic_staff());
    }

    #[test]
    fn email_match_ignores_case_and_whitespace() {
        let u = user(None, Some("Ana@Example.com"));
        assert!(u.has_email(" ana@example.com"));
        assert!(!u.has_email("bob@example.com"));
        assert!(!user(None, None).has_email("ana@example.com"));
    }
}
