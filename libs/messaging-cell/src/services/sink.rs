use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{MessagingError, OutboundMessage};

/// Fire-and-forget delivery. Implementations report failure; a failed send
/// never unwinds a transition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingSink: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessagingError>;
}

/// Transactional email/SMS gateway reached over HTTP.
/// POST {base_url}/v1/messages
#[derive(Debug)]
pub struct HttpMessagingSink {
    client: Client,
    base_url: String,
    api_key: String,
    from_address: String,
}

impl HttpMessagingSink {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        if !config.is_messaging_configured() {
            return Err(MessagingError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.messaging_api_url.trim_end_matches('/').to_string(),
            api_key: config.messaging_api_key.clone(),
            from_address: config.messaging_from_address.clone(),
        })
    }
}

#[async_trait]
impl MessagingSink for HttpMessagingSink {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("Sending {} message to {} via {}", message.kind, message.to, url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "from": self.from_address,
                "to": message.to,
                "subject": message.subject,
                "text": message.body,
                "tags": [message.kind.to_string()],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Message delivery failed: {} - {}", status, response_text);
            return Err(MessagingError::Delivery {
                status: status.as_u16(),
                message: response_text,
            });
        }

        Ok(())
    }
}

/// Used when no gateway is configured; messages only reach the log.
pub struct LogMessagingSink;

#[async_trait]
impl MessagingSink for LogMessagingSink {
    async fn send(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        info!(kind = %message.kind, to = %message.to, subject = %message.subject, "Outbound message (log only)");
        Ok(())
    }
}

pub fn sink_from_config(config: &AppConfig) -> Arc<dyn MessagingSink> {
    match HttpMessagingSink::new(config) {
        Ok(sink) => Arc::new(sink),
        Err(_) => {
            info!("Messaging gateway not configured, falling back to log-only delivery");
            Arc::new(LogMessagingSink)
        }
    }
}
