use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::Session,
    error::ApiError,
    profiles::dto::{UpdateProfileRequest, UploadedFile},
    profiles::repo::{self, Profile},
    state::AppState,
    storage::object_key,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/me/avatar", post(upload_avatar))
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
}

#[instrument(skip(session))]
pub async fn get_me(session: Session) -> Result<Json<Profile>, ApiError> {
    Ok(Json(session.profile))
}

#[instrument(skip(state, session, updates))]
pub async fn update_me(
    State(state): State<AppState>,
    session: Session,
    Json(updates): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    if let Some(name) = &updates.full_name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("full_name must not be empty".into()));
        }
    }
    let profile = repo::update(&state.db, session.profile.id, &updates).await?;
    // The admin student views denormalize profile fields.
    state.cache.invalidate_prefix(&["students"]);
    info!(user_id = %profile.id, "profile updated");
    Ok(Json(profile))
}

/// Stores the avatar under a fresh randomized key and returns its public
/// URL. The previous object, if any, is left in place.
#[instrument(skip(state, session, multipart))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, ApiError> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("avatar").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        let bucket = state.config.storage.avatars_bucket.clone();
        let key = object_key(&file_name);
        state
            .storage
            .put_object(&bucket, &key, body, &content_type)
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        let url = state.storage.public_url(&bucket, &key);
        info!(user_id = %session.profile.id, key = %key, "avatar uploaded");
        return Ok(Json(UploadedFile { url }));
    }
    Err(ApiError::Validation("file field is required".into()))
}
