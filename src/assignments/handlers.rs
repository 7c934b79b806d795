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
    assignments::dto::{CreateAssignmentRequest, UpdateAssignmentRequest},
    assignments::repo::{self, Assignment},
    assignments::status::{derive_statuses, AssignmentWithStatus},
    auth::extractors::{RequireAdmin, RequireStudent},
    cache::QueryCache,
    error::ApiError,
    state::AppState,
    submissions::repo::{self as submissions_repo, Submission},
};

pub fn router() -> Router<AppState> {
    Router::new()
        // student surface
        .route("/assignments", get(list_my_assignments))
        .route("/assignments/:id", get(get_my_assignment))
        // admin surface
        .route(
            "/admin/assignments",
            get(list_assignments).post(create_assignment),
        )
        .route(
            "/admin/assignments/:id",
            get(get_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
}

// --- student reads ---

/// Published assignments of the student's cohort with their derived
/// status. The assignment and submission lists are fetched concurrently
/// and merged client-side of the database; nothing is stored.
#[instrument(skip(state, student))]
pub async fn list_my_assignments(
    State(state): State<AppState>,
    student: RequireStudent,
) -> Result<Json<Vec<AssignmentWithStatus>>, ApiError> {
    let Some(cohort_id) = student.0.cohort_id else {
        return Ok(Json(Vec::new()));
    };
    let student_id = student.0.id;

    let assignments_fut = {
        let db = state.db.clone();
        let key = QueryCache::key([
            "assignments".to_string(),
            cohort_id.to_string(),
            "published".into(),
        ]);
        state.cache.get_or_fetch(key, move || async move {
            let rows = repo::list_published_by_cohort(&db, cohort_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
    };
    let submissions_fut = {
        let db = state.db.clone();
        let key = QueryCache::key([
            "submissions".to_string(),
            "student".into(),
            student_id.to_string(),
        ]);
        state.cache.get_or_fetch(key, move || async move {
            let rows = submissions_repo::list_by_student(&db, student_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
    };

    let (assignments, submissions) = tokio::join!(assignments_fut, submissions_fut);
    let assignments: Vec<Assignment> = serde_json::from_value(assignments?.as_ref().clone())?;
    let submissions: Vec<Submission> = serde_json::from_value(submissions?.as_ref().clone())?;

    Ok(Json(derive_statuses(assignments, submissions)))
}

#[instrument(skip(state, student))]
pub async fn get_my_assignment(
    State(state): State<AppState>,
    student: RequireStudent,
    Path(id): Path<Uuid>,
) -> Result<Json<AssignmentWithStatus>, ApiError> {
    let cohort_id = student.0.cohort_id.ok_or(ApiError::NotFound("assignment"))?;
    let assignment = repo::get_published_for_cohort(&state.db, id, cohort_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("assignment"),
            other => other.into(),
        })?;
    let submission = submissions_repo::find_for_student(&state.db, id, student.0.id).await?;

    derive_statuses(vec![assignment], submission.into_iter().collect())
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::Internal("status derivation yielded nothing".into()))
}

// --- admin ---

#[instrument(skip(state))]
pub async fn list_assignments(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let value = state
        .cache
        .get_or_fetch(QueryCache::key(["assignments"]), move || async move {
            let rows = repo::list_all(&db).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn get_assignment(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key(["assignments".to_string(), id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let assignment = repo::get(&db, id).await.map_err(|e| match e {
                sqlx::Error::RowNotFound => ApiError::NotFound("assignment"),
                other => other.into(),
            })?;
            Ok(serde_json::to_value(assignment)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state, payload))]
pub async fn create_assignment(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let assignment = repo::create(&state.db, &payload).await?;
    state.cache.invalidate_prefix(&["assignments"]);
    info!(assignment_id = %assignment.id, cohort_id = %assignment.cohort_id, "assignment created");
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[instrument(skip(state, payload))]
pub async fn update_assignment(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssignmentRequest>,
) -> Result<Json<Assignment>, ApiError> {
    let assignment = repo::update(&state.db, id, &payload)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("assignment"),
            other => other.into(),
        })?;
    state.cache.invalidate_prefix(&["assignments"]);
    Ok(Json(assignment))
}

#[instrument(skip(state))]
pub async fn delete_assignment(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = repo::delete(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("assignment"));
    }
    state.cache.invalidate_prefix(&["assignments"]);
    // submissions cascade with the assignment, which moves the
    // submitted_assignments counts on the admin student details
    state.cache.invalidate_prefix(&["submissions"]);
    state.cache.invalidate_prefix(&["students"]);
    info!(assignment_id = %id, "assignment deleted");
    Ok(StatusCode::NO_CONTENT)
}
