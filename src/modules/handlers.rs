use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{RequireAdmin, RequireStudent},
    cache::QueryCache,
    error::ApiError,
    modules::dto::{
        CreateLessonRequest, CreateMaterialRequest, CreateModuleRequest, UpdateLessonRequest,
        UpdateMaterialRequest, UpdateModuleRequest, MATERIAL_KINDS,
    },
    modules::repo::{self, Lesson, Material, Module},
    profiles::dto::UploadedFile,
    state::AppState,
    storage::object_key,
};

pub fn router() -> Router<AppState> {
    Router::new()
        // student surface: own cohort, published content only
        .route("/modules", get(list_my_modules))
        .route("/lessons/:id/materials", get(list_lesson_materials))
        // admin surface
        .route("/admin/cohorts/:id/modules", get(list_cohort_modules))
        .route("/admin/modules", post(create_module))
        .route(
            "/admin/modules/:id",
            patch(update_module).delete(delete_module),
        )
        .route("/admin/lessons", post(create_lesson))
        .route(
            "/admin/lessons/:id",
            patch(update_lesson).delete(delete_lesson),
        )
        .route("/admin/lessons/:id/materials", get(list_materials_admin))
        .route("/admin/materials", post(create_material))
        .route(
            "/admin/materials/:id",
            patch(update_material).delete(delete_material),
        )
        .route(
            "/admin/materials/upload",
            post(upload_material_file).layer(DefaultBodyLimit::max(50 * 1024 * 1024)),
        )
}

// --- reads ---

/// Published modules of the student's own cohort, lessons attached. A
/// student without a cohort sees an empty catalog; no query is issued
/// for the missing scope.
#[instrument(skip(state, student))]
pub async fn list_my_modules(
    State(state): State<AppState>,
    student: RequireStudent,
) -> Result<Json<Value>, ApiError> {
    let Some(cohort_id) = student.0.cohort_id else {
        return Ok(Json(Value::Array(Vec::new())));
    };
    let db = state.db.clone();
    let key = QueryCache::key(["modules".to_string(), cohort_id.to_string(), "published".into()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_by_cohort(&db, cohort_id, true).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

#[instrument(skip(state))]
pub async fn list_cohort_modules(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(cohort_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key(["modules".to_string(), cohort_id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_by_cohort(&db, cohort_id, false).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

/// Student material list. Row-level scoping: the lesson must be published
/// and belong to the student's cohort; anything else reads as not found.
#[instrument(skip(state, student))]
pub async fn list_lesson_materials(
    State(state): State<AppState>,
    student: RequireStudent,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let cohort_id = student.0.cohort_id.ok_or(ApiError::NotFound("lesson"))?;
    if !repo::lesson_visible_to_cohort(&state.db, lesson_id, cohort_id).await? {
        return Err(ApiError::NotFound("lesson"));
    }
    cached_materials(&state, lesson_id).await
}

#[instrument(skip(state))]
pub async fn list_materials_admin(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(lesson_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    cached_materials(&state, lesson_id).await
}

async fn cached_materials(state: &AppState, lesson_id: Uuid) -> Result<Json<Value>, ApiError> {
    let db = state.db.clone();
    let key = QueryCache::key(["materials".to_string(), lesson_id.to_string()]);
    let value = state
        .cache
        .get_or_fetch(key, move || async move {
            let rows = repo::list_materials(&db, lesson_id).await?;
            Ok(serde_json::to_value(rows)?)
        })
        .await?;
    Ok(Json(value.as_ref().clone()))
}

// --- module mutations ---

#[instrument(skip(state, payload))]
pub async fn create_module(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let module = repo::create_module(&state.db, &payload).await?;
    state.cache.invalidate_prefix(&["modules"]);
    info!(module_id = %module.id, cohort_id = %module.cohort_id, "module created");
    Ok((StatusCode::CREATED, Json(module)))
}

#[instrument(skip(state, payload))]
pub async fn update_module(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateModuleRequest>,
) -> Result<Json<Module>, ApiError> {
    let module = repo::update_module(&state.db, id, &payload)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("module"),
            other => other.into(),
        })?;
    state.cache.invalidate_prefix(&["modules"]);
    Ok(Json(module))
}

#[instrument(skip(state))]
pub async fn delete_module(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = repo::delete_module(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("module"));
    }
    state.cache.invalidate_prefix(&["modules"]);
    state.cache.invalidate_prefix(&["materials"]);
    // completion rows cascade with the lessons, which moves the
    // completed_lessons counts on the admin student details
    state.cache.invalidate_prefix(&["progress"]);
    state.cache.invalidate_prefix(&["students"]);
    info!(module_id = %id, "module deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- lesson mutations ---

#[instrument(skip(state, payload))]
pub async fn create_lesson(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let lesson = repo::create_lesson(&state.db, &payload).await?;
    state.cache.invalidate_prefix(&["modules"]);
    info!(lesson_id = %lesson.id, module_id = %lesson.module_id, "lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

#[instrument(skip(state, payload))]
pub async fn update_lesson(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<Json<Lesson>, ApiError> {
    let lesson = repo::update_lesson(&state.db, id, &payload)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("lesson"),
            other => other.into(),
        })?;
    state.cache.invalidate_prefix(&["modules"]);
    Ok(Json(lesson))
}

#[instrument(skip(state))]
pub async fn delete_lesson(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = repo::delete_lesson(&state.db, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("lesson"));
    }
    state.cache.invalidate_prefix(&["modules"]);
    state.cache.invalidate_prefix(&["materials"]);
    // completion rows cascade with the lesson
    state.cache.invalidate_prefix(&["progress"]);
    state.cache.invalidate_prefix(&["students"]);
    info!(lesson_id = %id, "lesson deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- material mutations ---

fn validate_material_kind(kind: &str) -> Result<(), ApiError> {
    if !MATERIAL_KINDS.contains(&kind) {
        return Err(ApiError::Validation(format!(
            "type must be one of {}",
            MATERIAL_KINDS.join(", ")
        )));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn create_material(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if payload.file_url.trim().is_empty() {
        return Err(ApiError::Validation("file_url is required".into()));
    }
    validate_material_kind(&payload.kind)?;

    let material = repo::create_material(&state.db, &payload).await?;
    state
        .cache
        .invalidate_prefix(&["materials", &material.lesson_id.to_string()]);
    info!(material_id = %material.id, lesson_id = %material.lesson_id, "material created");
    Ok((StatusCode::CREATED, Json(material)))
}

#[instrument(skip(state, payload))]
pub async fn update_material(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<Json<Material>, ApiError> {
    if let Some(kind) = &payload.kind {
        validate_material_kind(kind)?;
    }
    let material = repo::update_material(&state.db, id, &payload)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("material"),
            other => other.into(),
        })?;
    state
        .cache
        .invalidate_prefix(&["materials", &material.lesson_id.to_string()]);
    Ok(Json(material))
}

#[instrument(skip(state))]
pub async fn delete_material(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let lesson_id = repo::delete_material(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("material"))?;
    state
        .cache
        .invalidate_prefix(&["materials", &lesson_id.to_string()]);
    info!(material_id = %id, "material deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Stores the file under a fresh randomized key and returns its public
/// URL for a subsequent material create. Re-uploads are never
/// deduplicated and old objects are not cleaned up.
#[instrument(skip(state, multipart))]
pub async fn upload_material_file(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, ApiError> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("material").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        let bucket = state.config.storage.materials_bucket.clone();
        let key = object_key(&file_name);
        state
            .storage
            .put_object(&bucket, &key, body, &content_type)
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        let url = state.storage.public_url(&bucket, &key);
        info!(key = %key, "material file uploaded");
        return Ok(Json(UploadedFile { url }));
    }
    Err(ApiError::Validation("file field is required".into()))
}
