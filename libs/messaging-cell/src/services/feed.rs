use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::NotificationRecord;

/// Writes rows into the in-app notification feed. The feed itself is
/// rendered elsewhere; a failed write is logged and forgotten.
pub struct NotificationFeed {
    supabase: Arc<SupabaseClient>,
}

impl NotificationFeed {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn record(&self, entry: NotificationRecord, auth_token: &str) -> bool {
        let body = json!({
            "recipient_id": entry.recipient_id,
            "recipient_kind": entry.recipient_kind,
            "kind": entry.kind,
            "title": entry.title,
            "message": entry.message,
            "appointment_request_id": entry.appointment_request_id,
            "is_read": false,
            "created_at": Utc::now().to_rfc3339(),
        });

        match self
            .supabase
            .execute(Method::POST, "/rest/v1/notifications", Some(auth_token), Some(body))
            .await
        {
            Ok(()) => {
                debug!("Recorded {} notification for {}", entry.kind, entry.recipient_id);
                true
            }
            Err(e) => {
                warn!("Failed to record {} notification for {}: {}", entry.kind, entry.recipient_id, e);
                false
            }
        }
    }
}
