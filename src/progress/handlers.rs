use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::RequireStudent,
    cache::QueryCache,
    error::ApiError,
    modules::repo as modules_repo,
    progress::repo,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ToggleProgressRequest {
    pub completed: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my/progress", get(list_my_progress))
        .route("/my/progress/:lesson_id", put(toggle_progress))
}

#[instrument(skip(state, student))]
pub async fn list_my_progress(
    State(state): State<AppState>,
    student: RequireStudent,
) -> Result<Json<Value>, ApiError> {
    let student_id = student.0.id;
    let db = state.db.clone();
    let key = QueryCache::key(["progress".to_string(), student_id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_by_student(&db, student_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

/// Toggle completion for one lesson. Completing is an idempotent
/// upsert; un-completing deletes the row and is a no-op when no row
/// exists.
#[instrument(skip(state, student, payload))]
pub async fn toggle_progress(
    State(state): State<AppState>,
    student: RequireStudent,
    Path(lesson_id): Path<Uuid>,
    Json(payload): Json<ToggleProgressRequest>,
) -> Result<Response, ApiError> {
    let cohort_id = student.0.cohort_id.ok_or(ApiError::NotFound("lesson"))?;
    if !modules_repo::lesson_visible_to_cohort(&state.db, lesson_id, cohort_id).await? {
        return Err(ApiError::NotFound("lesson"));
    }

    let student_id = student.0.id;
    let response = if payload.completed {
        let progress = repo::mark_complete(&state.db, student_id, lesson_id).await?;
        Json(progress).into_response()
    } else {
        repo::mark_incomplete(&state.db, student_id, lesson_id).await?;
        StatusCode::NO_CONTENT.into_response()
    };

    let student_segment = student_id.to_string();
    state.cache.invalidate_prefix(&["progress", &student_segment]);
    // the admin student detail embeds a completed lesson count
    state.cache.invalidate_prefix(&["students", &student_segment]);
    info!(%lesson_id, completed = payload.completed, "lesson progress toggled");
    Ok(response)
}
