use std::env;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// n8n webhook that feeds the RAG ingestion pipeline. Without it, sync
    /// entries are still recorded but nothing is dispatched.
    pub n8n_rag_webhook_url: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: String,
    pub qdrant_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse()?,
            Err(_) => 8000,
        };
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:studio.db".to_string()),
            n8n_rag_webhook_url: env::var("N8N_RAG_WEBHOOK_URL").ok(),
            qdrant_url: env::var("QDRANT_URL").ok(),
            qdrant_collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "studio_knowledge".to_string()),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok(),
        })
    }
}
