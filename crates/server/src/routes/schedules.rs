//! Routes for weekly class schedules. Every write runs through the global
//! overlap check before it touches the table.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::schedule::{ClassSchedule, CreateClassSchedule, UpdateClassSchedule};
use serde::Deserialize;
use services::services::overlap::{ExcludeEntity, ScheduleConflict, check_global_overlap};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub(crate) fn conflict_message(conflict: &ScheduleConflict) -> String {
    format!(
        "Conflicto de horario: Ya existe '{}' el {} de {} a {}.",
        conflict.name, conflict.day, conflict.start, conflict.end
    )
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ClassSchedule>>>, ApiError> {
    let schedules = ClassSchedule::find_all(&state.db.pool, query.active_only).await?;
    Ok(ResponseJson(ApiResponse::success(schedules)))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<ClassSchedule>>, ApiError> {
    let schedule = ClassSchedule::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Horario {id} no encontrado")))?;
    Ok(ResponseJson(ApiResponse::success(schedule)))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    ResponseJson(data): ResponseJson<CreateClassSchedule>,
) -> Result<ResponseJson<ApiResponse<ClassSchedule>>, ApiError> {
    if data.is_active
        && let Some(conflict) = check_global_overlap(
            &state.db.pool,
            &data.day_of_week,
            &data.start_time,
            &data.end_time,
            None,
        )
        .await?
    {
        return Err(ApiError::Conflict(conflict_message(&conflict)));
    }

    let schedule = ClassSchedule::create(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(schedule)))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ResponseJson(update): ResponseJson<UpdateClassSchedule>,
) -> Result<ResponseJson<ApiResponse<ClassSchedule>>, ApiError> {
    let existing = ClassSchedule::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Horario {id} no encontrado")))?;

    // validate the values as they will be stored, not just the changed ones
    let merged = existing.merged_with(&update);
    if merged.is_active
        && let Some(conflict) = check_global_overlap(
            &state.db.pool,
            &merged.day_of_week,
            &merged.start_time,
            &merged.end_time,
            Some(ExcludeEntity::Schedule(id)),
        )
        .await?
    {
        return Err(ApiError::Conflict(conflict_message(&conflict)));
    }

    let schedule = ClassSchedule::update(&state.db.pool, id, &merged).await?;
    Ok(ResponseJson(ApiResponse::success(schedule)))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = ClassSchedule::delete(&state.db.pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(format!("Horario {id} no encontrado")));
    }
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Horario eliminado",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedules", get(list_schedules))
        .route("/schedules", post(create_schedule))
        .route("/schedules/{id}", get(get_schedule))
        .route("/schedules/{id}", put(update_schedule))
        .route("/schedules/{id}", delete(delete_schedule))
}
