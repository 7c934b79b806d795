use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    assignments::repo as assignments_repo,
    auth::extractors::{RequireAdmin, RequireStudent},
    cache::QueryCache,
    error::ApiError,
    state::AppState,
    submissions::dto::{GradeRequest, SubmitRequest, GRADING_STATUSES},
    submissions::repo::{self, Submission},
};

pub fn router() -> Router<AppState> {
    Router::new()
        // student surface
        .route("/assignments/:id/submissions", post(submit))
        .route("/my/submissions", get(list_my_submissions))
        // admin surface
        .route(
            "/admin/assignments/:id/submissions",
            get(list_assignment_submissions),
        )
        .route("/admin/submissions/:id/grade", post(grade_submission))
}

/// Student submit. Upserts the single (assignment, student) row, so a
/// resubmission replaces the previous attempt.
#[instrument(skip(state, student, payload))]
pub async fn submit(
    State(state): State<AppState>,
    student: RequireStudent,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    if !payload.has_content() {
        return Err(ApiError::Validation(
            "one of content_text, file_url or link_url is required".into(),
        ));
    }

    // The assignment must be published into the student's cohort; anything
    // else reads as not found.
    let cohort_id = student.0.cohort_id.ok_or(ApiError::NotFound("assignment"))?;
    assignments_repo::get_published_for_cohort(&state.db, assignment_id, cohort_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("assignment"),
            other => other.into(),
        })?;

    let submission = repo::upsert(&state.db, assignment_id, student.0.id, &payload).await?;
    state.cache.invalidate_prefix(&["submissions"]);
    // submission_count on the admin assignment list changes with it,
    // as does submitted_assignments on the student's admin detail
    state.cache.invalidate_prefix(&["assignments"]);
    let student_segment = student.0.id.to_string();
    state.cache.invalidate_prefix(&["students", &student_segment]);
    info!(
        submission_id = %submission.id,
        assignment_id = %assignment_id,
        student_id = %student.0.id,
        "submission received"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

#[instrument(skip(state, student))]
pub async fn list_my_submissions(
    State(state): State<AppState>,
    student: RequireStudent,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let student_id = student.0.id;
    let key = QueryCache::key(["submissions".to_string(), "student".into(), student_id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_by_student(&db, student_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn list_assignment_submissions(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key([
        "submissions".to_string(),
        "assignment".into(),
        assignment_id.to_string(),
    ]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_by_assignment(&db, assignment_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state, payload))]
pub async fn grade_submission(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradeRequest>,
) -> Result<Json<Submission>, ApiError> {
    if !GRADING_STATUSES.contains(&payload.status.as_str()) {
        return Err(ApiError::Validation(format!(
            "status must be one of {}",
            GRADING_STATUSES.join(", ")
        )));
    }
    let submission = repo::grade(
        &state.db,
        id,
        &payload.status,
        payload.grade.as_deref(),
        payload.feedback.as_deref(),
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => ApiError::NotFound("submission"),
        other => other.into(),
    })?;
    state.cache.invalidate_prefix(&["submissions"]);
    info!(submission_id = %id, status = %submission.status, "submission graded");
    Ok(Json(submission))
}
