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
    cohorts::dto::{CreateCohortRequest, UpdateCohortRequest},
    cohorts::repo::{self, Cohort},
    error::ApiError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/cohorts", get(list_cohorts).post(create_cohort))
        .route(
            "/admin/cohorts/:id",
            get(get_cohort).patch(update_cohort).delete(delete_cohort),
        )
}

#[instrument(skip(state))]
pub async fn list_cohorts(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let value = state
        .cache
        .get_or_fetch(QueryCache::key(["cohorts"]), move || async move {
            let rows = repo::list(&db).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn get_cohort(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key(["cohorts".to_string(), id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let cohort = repo::get(&db, id)
                .await
                .map_err(|e| match e {
                    sqlx::Error::RowNotFound => ApiError::NotFound("cohort"),
                    other => other.into(),
                })?;
            Ok(serde_json::to_value(cohort)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state, payload))]
pub async fn create_cohort(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(payload): Json<CreateCohortRequest>,
) -> Result<(StatusCode, Json<Cohort>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    let cohort = repo::create(&state.db, &payload).await?;
    state.cache.invalidate_prefix(&["cohorts"]);
    info!(cohort_id = %cohort.id, name = %cohort.name, "cohort created");
    Ok((StatusCode::CREATED, Json(cohort)))
}

#[instrument(skip(state, payload))]
pub async fn update_cohort(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCohortRequest>,
) -> Result<Json<Cohort>, ApiError> {
    let cohort = repo::update(&state.db, id, &payload)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("cohort"),
            other => other.into(),
        })?;
    state.cache.invalidate_prefix(&["cohorts"]);
    Ok(Json(cohort))
}

#[instrument(skip(state))]
pub async fn delete_cohort(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = repo::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("cohort"));
    }
    // Everything under the cohort cascades with it: modules, lessons,
    // materials, assignments, submissions and progress rows, and with
    // them the counts embedded in the admin student views.
    state.cache.invalidate_prefix(&["cohorts"]);
    state.cache.invalidate_prefix(&["modules"]);
    state.cache.invalidate_prefix(&["materials"]);
    state.cache.invalidate_prefix(&["assignments"]);
    state.cache.invalidate_prefix(&["submissions"]);
    state.cache.invalidate_prefix(&["progress"]);
    state.cache.invalidate_prefix(&["students"]);
    info!(cohort_id = %id, "cohort deleted");
    Ok(StatusCode::NO_CONTENT)
}
