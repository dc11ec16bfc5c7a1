//! Direct Qdrant access for the one operation the pipeline does not cover:
//! removing points when entities are deleted or the memory is reset.

use async_trait::async_trait;
use db::models::entity::EntityKind;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum VectorIndexError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
}

/// Point id derived from the entity identity alone, so delete works even
/// when no vector_id was ever stored locally.
pub fn deterministic_point_id(kind: EntityKind, id: i64) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{kind}_{id}").as_bytes())
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn delete_point(&self, point_id: Uuid) -> Result<(), VectorIndexError>;
}

#[derive(Debug, Clone)]
pub struct QdrantClient {
    http: Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn new(
        base_url: String,
        collection: String,
        api_key: Option<String>,
    ) -> Result<Self, VectorIndexError> {
        let http = Client::builder()
            .user_agent(concat!("studio-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VectorIndexError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection,
            api_key,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    async fn delete_point(&self, point_id: Uuid) -> Result<(), VectorIndexError> {
        let url = format!(
            "{}/collections/{}/points/delete",
            self.base_url, self.collection
        );
        let mut request = self
            .http
            .post(&url)
            .json(&json!({ "points": [point_id.to_string()] }));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        let res = request
            .send()
            .await
            .map_err(|e| VectorIndexError::Transport(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        Err(VectorIndexError::Http {
            status: status.as_u16(),
            body,
        })
    }
}
