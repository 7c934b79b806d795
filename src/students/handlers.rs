use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::RequireAdmin,
    cache::QueryCache,
    error::ApiError,
    state::AppState,
    students::{dto::AssignCohortRequest, repo},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/students", get(list_students))
        .route("/admin/students/:id", get(get_student))
        .route("/admin/students/:id/cohort", axum::routing::put(assign_cohort))
}

#[instrument(skip(state))]
pub async fn list_students(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let value = state
        .cache
        .get_or_fetch(QueryCache::key(["students"]), move || async move {
            let rows = repo::list(&db).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn get_student(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key(["students".to_string(), id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let detail = repo::get(&db, id).await.map_err(|e| match e {
                sqlx::Error::RowNotFound => ApiError::NotFound("student"),
                other => other.into(),
            })?;
            Ok(serde_json::to_value(detail)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state, payload))]
pub async fn assign_cohort(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignCohortRequest>,
) -> Result<StatusCode, ApiError> {
    let updated = repo::set_cohort(&state.db, id, payload.cohort_id).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("student"));
    }
    state.cache.invalidate_prefix(&["students"]);
    // cohort rosters carry a live student count
    state.cache.invalidate_prefix(&["cohorts"]);
    info!(student_id = %id, cohort_id = ?payload.cohort_id, "student cohort updated");
    Ok(StatusCode::NO_CONTENT)
}
