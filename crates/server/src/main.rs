use std::sync::Arc;

use db::DBService;
use server::config::Config;
use server::{AppState, app};
use services::services::rag_sync::RagSyncService;
use services::services::vector_index::{QdrantClient, VectorIndex};
use services::services::webhook::{N8nWebhookClient, WebhookDispatcher};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = DBService::new(&config.database_url).await?;

    let dispatcher: Option<Arc<dyn WebhookDispatcher>> = match &config.n8n_rag_webhook_url {
        Some(url) => Some(Arc::new(N8nWebhookClient::new(url.clone())?)),
        None => {
            warn!("N8N_RAG_WEBHOOK_URL not set, sync notifications will not be dispatched");
            None
        }
    };
    let vector_index: Option<Arc<dyn VectorIndex>> = match &config.qdrant_url {
        Some(url) => Some(Arc::new(QdrantClient::new(
            url.clone(),
            config.qdrant_collection.clone(),
            config.qdrant_api_key.clone(),
        )?)),
        None => {
            warn!("QDRANT_URL not set, vector points will not be removed on delete");
            None
        }
    };

    let sync = RagSyncService::new(db.clone(), dispatcher, vector_index);
    let state = AppState { db, sync };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
