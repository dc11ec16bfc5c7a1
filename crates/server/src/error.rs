use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use services::services::overlap::OverlapError;
use services::services::rag_sync::RagSyncError;
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Overlap(#[from] OverlapError),
    #[error(transparent)]
    Sync(#[from] RagSyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Conflict(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Overlap(OverlapError::InvalidTime(_)) => StatusCode::BAD_REQUEST,
            ApiError::Sync(RagSyncError::UnknownEntityType(_))
            | ApiError::Sync(RagSyncError::InvalidStatus(_)) => StatusCode::BAD_REQUEST,
            ApiError::Database(_)
            | ApiError::Overlap(_)
            | ApiError::Sync(RagSyncError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {self}");
        }
        let body = ApiResponse::<()>::error(&self.to_string());
        (status, Json(body)).into_response()
    }
}
