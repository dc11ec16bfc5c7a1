//! Outbound webhook to the RAG ingestion pipeline (n8n).

use std::time::Duration;

use async_trait::async_trait;
use db::models::entity::EntityKind;
use db::models::sync_log::SyncAction;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dispatch never holds an HTTP request open longer than this; the pipeline
/// reports its real outcome later through the callback.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout after {}s", WEBHOOK_TIMEOUT.as_secs())]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
}

/// Flattened text fields of the entity being synced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatFields {
    pub title: String,
    pub content: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Body sent to the pipeline. The flattened fields appear both at the top
/// level and under `data`, so consumers can read either shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncWebhookPayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub entity_type: EntityKind,
    pub action: SyncAction,
    pub log_id: i64,
    /// Last known point id, or empty when the entity was never vectorized.
    pub vector_id: String,
    #[serde(flatten)]
    pub fields: FlatFields,
    pub data: FlatFields,
}

/// Seam for tests and for running without a configured pipeline.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn dispatch(&self, payload: &SyncWebhookPayload) -> Result<(), WebhookError>;
}

/// HTTP dispatcher posting to a single n8n webhook URL.
#[derive(Debug, Clone)]
pub struct N8nWebhookClient {
    http: Client,
    url: String,
}

impl N8nWebhookClient {
    pub fn new(url: String) -> Result<Self, WebhookError> {
        let http = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(concat!("studio-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WebhookError::Transport(e.to_string()))?;
        Ok(Self { http, url })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> WebhookError {
    if e.is_timeout() {
        WebhookError::Timeout
    } else {
        WebhookError::Transport(e.to_string())
    }
}

#[async_trait]
impl WebhookDispatcher for N8nWebhookClient {
    async fn dispatch(&self, payload: &SyncWebhookPayload) -> Result<(), WebhookError> {
        let res = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(WebhookError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_flattens_fields_at_top_level() {
        let payload = SyncWebhookPayload {
            id: 7,
            entity_type: EntityKind::YogaClass,
            action: SyncAction::Update,
            log_id: 42,
            vector_id: String::new(),
            fields: FlatFields {
                title: "Hatha".to_string(),
                content: "# Hatha\n\nClase suave".to_string(),
                slug: "hatha".to_string(),
                category: Some("yoga".to_string()),
                tags: None,
            },
            data: FlatFields {
                title: "Hatha".to_string(),
                content: "# Hatha\n\nClase suave".to_string(),
                slug: "hatha".to_string(),
                category: Some("yoga".to_string()),
                tags: None,
            },
        };

        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["type"], "yoga_class");
        assert_eq!(value["action"], "update");
        assert_eq!(value["title"], "Hatha");
        assert_eq!(value["data"]["slug"], "hatha");
        assert_eq!(value["log_id"], 42);
        // never-vectorized entities send an empty point id
        assert_eq!(value["vector_id"], "");
        // absent optionals stay out of the body entirely
        assert!(value.get("tags").is_none());
    }
}
