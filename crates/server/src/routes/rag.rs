//! Routes for the RAG synchronization pipeline: the callback it reports
//! into, status and ledger inspection, and the manual triggers.

use std::str::FromStr;

use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::entity::EntityKind;
use db::models::sync_log::{RagSyncLog, SyncStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use services::services::rag_sync::{CallbackOutcome, SyncCallback};
use services::services::sync_status::{SyncStatusReport, get_sync_status};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

fn parse_scope(raw: Option<&str>) -> Result<Option<EntityKind>, ApiError> {
    match raw {
        None | Some("all") => Ok(None),
        Some(name) => EntityKind::from_str(name)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("tipo de entidad desconocido: '{name}'"))),
    }
}

/// Callback endpoint for the pipeline. Responds with a plain body in the
/// shape n8n expects rather than the API envelope.
pub async fn sync_callback(
    State(state): State<AppState>,
    ResponseJson(callback): ResponseJson<SyncCallback>,
) -> Result<ResponseJson<Value>, ApiError> {
    let status = callback.status.clone();
    let outcome = state.sync.report_sync_result(callback).await?;
    let message = match outcome {
        CallbackOutcome::Updated => "Resultado de sincronización registrado",
        CallbackOutcome::StaleEntity => {
            "Resultado registrado; la entidad ya no existe"
        }
    };
    Ok(ResponseJson(json!({
        "success": true,
        "message": message,
        "status": status,
    })))
}

pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<SyncStatusReport>>, ApiError> {
    let report = get_sync_status(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

#[derive(Debug, Deserialize)]
pub struct SyncLogsQuery {
    pub limit: Option<i64>,
    pub entity_type: Option<String>,
    pub status: Option<String>,
}

pub async fn sync_logs(
    State(state): State<AppState>,
    Query(query): Query<SyncLogsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<RagSyncLog>>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let entity_type = parse_scope(query.entity_type.as_deref())?;
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(SyncStatus::from_str(raw).map_err(|_| {
            ApiError::BadRequest(format!("estado de sincronización inválido: '{raw}'"))
        })?),
    };

    let logs = RagSyncLog::find_recent(&state.db.pool, limit, entity_type, status).await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

#[derive(Debug, Deserialize)]
pub struct TriggerSyncRequest {
    pub sync_type: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TriggerSyncResponse {
    pub triggered_count: u64,
}

pub async fn trigger_sync(
    State(state): State<AppState>,
    ResponseJson(request): ResponseJson<TriggerSyncRequest>,
) -> Result<ResponseJson<ApiResponse<TriggerSyncResponse>>, ApiError> {
    let scope = parse_scope(request.sync_type.as_deref())?;
    let triggered_count = state.sync.trigger_sync(scope, request.force).await?;
    Ok(ResponseJson(ApiResponse::success(TriggerSyncResponse {
        triggered_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MemoryResetRequest {
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MemoryResetResponse {
    pub success: bool,
    pub reset_count: u64,
    pub message: String,
}

/// Tear down the assistant's memory for one entity type or all of them.
pub async fn chat_memory_reset(
    State(state): State<AppState>,
    ResponseJson(request): ResponseJson<MemoryResetRequest>,
) -> Result<ResponseJson<MemoryResetResponse>, ApiError> {
    let scope = parse_scope(request.scope.as_deref())?;
    let reset_count = state.sync.reset_sync_scope(scope).await?;
    let message = match scope {
        Some(kind) => format!("Memoria reiniciada para {kind}: {reset_count} registros"),
        None => format!("Memoria reiniciada por completo: {reset_count} registros"),
    };
    Ok(ResponseJson(MemoryResetResponse {
        success: true,
        reset_count,
        message,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/rag",
        Router::new()
            .route("/sync-callback", post(sync_callback))
            .route("/sync-status", get(sync_status))
            .route("/sync-logs", get(sync_logs))
            .route("/sync", post(trigger_sync))
            .route("/chat-memory-reset", post(chat_memory_reset)),
    )
}
