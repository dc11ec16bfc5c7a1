//! Routes for activities. Course writes validate their embedded sessions
//! strictly and run each one through the global overlap check; every write
//! also notifies the sync pipeline.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::activity::{
    Activity, COURSE_KIND, CourseSession, CreateActivity, UpdateActivity,
};
use db::models::entity::EntityKind;
use db::models::sync_log::SyncAction;
use serde::Deserialize;
use services::services::overlap::{ExcludeEntity, check_interval_overlap};
use tracing::warn;
use utils::response::ApiResponse;
use utils::time::parse_hhmm;

use crate::routes::schedules::conflict_message;
use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
}

/// Strict session extraction for write paths. Reading back tolerates legacy
/// garbage; new data does not get to introduce any.
fn course_sessions_strict(data: &CreateActivity) -> Result<Vec<CourseSession>, ApiError> {
    if data.kind != COURSE_KIND {
        return Ok(Vec::new());
    }
    let Some(value) = &data.activity_data else {
        return Ok(Vec::new());
    };
    let Some(raw_sessions) = value.get("schedule") else {
        return Ok(Vec::new());
    };
    let entries = raw_sessions.as_array().ok_or_else(|| {
        ApiError::BadRequest("El campo 'schedule' debe ser una lista de sesiones".to_string())
    })?;

    let mut sessions = Vec::with_capacity(entries.len());
    for entry in entries {
        let session: CourseSession = serde_json::from_value(entry.clone()).map_err(|e| {
            ApiError::BadRequest(format!("Sesión de curso inválida: {e}"))
        })?;
        session.validate().map_err(ApiError::BadRequest)?;
        sessions.push(session);
    }
    Ok(sessions)
}

/// Check every session of a course against the shared weekly calendar.
async fn check_sessions(
    state: &AppState,
    sessions: &[CourseSession],
    exclude: Option<ExcludeEntity>,
) -> Result<(), ApiError> {
    for session in sessions {
        // validated above, so the parse cannot fail here
        let Some(start) = parse_hhmm(&session.time) else {
            continue;
        };
        let start = i64::from(start);
        let end = start.saturating_add(session.duration_minutes);
        if let Some(conflict) =
            check_interval_overlap(&state.db.pool, &session.day, start, end, exclude).await?
        {
            return Err(ApiError::Conflict(conflict_message(&conflict)));
        }
    }
    Ok(())
}

/// Fire-and-forget sync notification; write responses never depend on it.
async fn notify(state: &AppState, id: i64, action: SyncAction) {
    if let Err(e) = state
        .sync
        .notify_entity_changed(EntityKind::Activity, id, action, None)
        .await
    {
        warn!(activity_id = id, "sync notification failed: {e}");
    }
}

pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Activity>>>, ApiError> {
    let activities = Activity::find_all(&state.db.pool, query.active_only).await?;
    Ok(ResponseJson(ApiResponse::success(activities)))
}

pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    let activity = Activity::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Actividad {id} no encontrada")))?;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

pub async fn create_activity(
    State(state): State<AppState>,
    ResponseJson(data): ResponseJson<CreateActivity>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    let sessions = course_sessions_strict(&data)?;
    if data.is_active {
        check_sessions(&state, &sessions, None).await?;
    }

    let activity = Activity::create(&state.db.pool, &data).await?;
    notify(&state, activity.id, SyncAction::Create).await;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

pub async fn update_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ResponseJson(update): ResponseJson<UpdateActivity>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    let existing = Activity::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Actividad {id} no encontrada")))?;

    let merged = existing.merged_with(&update);
    let sessions = course_sessions_strict(&merged)?;
    if merged.is_active {
        check_sessions(&state, &sessions, Some(ExcludeEntity::Activity(id))).await?;
    }

    let activity = Activity::update(&state.db.pool, id, &merged).await?;
    notify(&state, id, SyncAction::Update).await;
    Ok(ResponseJson(ApiResponse::success(activity)))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    // snapshot first, the row is gone by the time the notification fires
    let snapshot = EntityKind::Activity.fetch(&state.db.pool, id).await?;
    let deleted = Activity::delete(&state.db.pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("Actividad {id} no encontrada")));
    }
    if let Err(e) = state
        .sync
        .notify_entity_changed(EntityKind::Activity, id, SyncAction::Delete, snapshot)
        .await
    {
        warn!(activity_id = id, "sync notification failed: {e}");
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Actividad eliminada",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list_activities))
        .route("/activities", post(create_activity))
        .route("/activities/{id}", get(get_activity))
        .route("/activities/{id}", put(update_activity))
        .route("/activities/{id}", delete(delete_activity))
}
