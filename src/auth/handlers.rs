use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, JwtKeys, LoginRequest, RefreshRequest, RegisterRequest},
        extractors::MaybeSession,
        guard::{self, GuardOutcome, SessionState},
        repo::User,
        services::{hash_password, initials_for, is_valid_email, verify_password},
    },
    error::ApiError,
    profiles::repo as profiles_repo,
    profiles::repo::Role,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Navigable shell routes gated per role. API consumers use the JSON
/// surface under /api/v1; these exist so that plain navigation always
/// lands somewhere valid.
pub fn pages_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/dashboard", get(student_home))
        .route("/admin", get(admin_home))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    let full_name = payload.full_name.trim().to_string();

    if full_name.is_empty() {
        return Err(ApiError::Validation("full_name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation("password too short".into()));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e.to_string())
    })?;

    let mut tx = state.db.begin().await?;
    let user = User::insert_tx(&mut tx, &payload.email, &hash).await?;
    let profile = profiles_repo::insert_tx(
        &mut tx,
        user.id,
        &full_name,
        &payload.email,
        initials_for(&full_name).as_deref(),
    )
    .await?;
    tx.commit().await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .sign_access(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let refresh_token = keys
        .sign_refresh(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            refresh_token,
            profile,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthenticated
        })?;

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Internal(e.to_string())
    })?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthenticated);
    }

    let profile = profiles_repo::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %user.id, "login identity has no profile");
            ApiError::Unauthenticated
        })?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .sign_access(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let refresh_token = keys
        .sign_refresh(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        profile,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Unauthenticated)?;

    let profile = profiles_repo::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let access_token = keys
        .sign_access(claims.sub)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let refresh_token = keys
        .sign_refresh(claims.sub)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        profile,
    }))
}

// --- navigable shell ---

async fn login_page(MaybeSession(session): MaybeSession) -> Response {
    // Authenticated navigation to login bounces to the role's own home.
    if let SessionState::Authenticated { role: Some(role) } = session {
        return Redirect::to(role.home_path()).into_response();
    }
    "login".into_response()
}

async fn student_home(MaybeSession(session): MaybeSession) -> Response {
    guarded(Role::Student, &session, "student dashboard")
}

async fn admin_home(MaybeSession(session): MaybeSession) -> Response {
    guarded(Role::Admin, &session, "admin dashboard")
}

fn guarded(required: Role, session: &SessionState, body: &'static str) -> Response {
    match guard::evaluate(required, session) {
        GuardOutcome::Allow => body.into_response(),
        GuardOutcome::Wait => "resolving session".into_response(),
        GuardOutcome::ToLogin => Redirect::to("/login").into_response(),
        GuardOutcome::ToHome(role) => Redirect::to(role.home_path()).into_response(),
    }
}

#[cfg(test)]
mod shell_tests {
    use super::*;

    #[test]
    fn guarded_redirects_follow_guard_outcomes() {
        let unauth = guarded(Role::Admin, &SessionState::Unauthenticated, "x");
        assert_eq!(unauth.status(), StatusCode::SEE_OTHER);
        assert_eq!(unauth.headers()["location"], "/login");

        let student = SessionState::Authenticated {
            role: Some(Role::Student),
        };
        let bounced = guarded(Role::Admin, &student, "x");
        assert_eq!(bounced.status(), StatusCode::SEE_OTHER);
        assert_eq!(bounced.headers()["location"], "/dashboard");

        let allowed = guarded(Role::Student, &student, "x");
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
