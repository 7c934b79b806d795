use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::dto::{JwtKeys, TokenKind};
use crate::auth::guard::SessionState;
use crate::error::ApiError;
use crate::profiles::repo::{self as profiles_repo, Profile, Role};
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Verified access-token identity. No role attached.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts).ok_or(ApiError::Unauthenticated)?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(ApiError::Unauthenticated);
            }
        };
        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthenticated);
        }

        Ok(AuthUser(claims.sub))
    }
}

/// Authenticated identity with its profile. The role is read from the
/// profile row on every request; a missing profile is treated as
/// unauthenticated, never as an implicit student.
pub struct Session {
    pub profile: Profile,
}

impl Session {
    pub fn role(&self) -> Option<Role> {
        self.profile.role()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let profile = profiles_repo::find_by_id(&state.db, user_id)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| {
                warn!(user_id = %user_id, "authenticated identity has no profile");
                ApiError::Unauthenticated
            })?;
        Ok(Session { profile })
    }
}

/// Role gate for the admin API surface.
pub struct RequireAdmin(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        match session.role() {
            Some(Role::Admin) => Ok(RequireAdmin(session.profile)),
            _ => Err(ApiError::AccessDenied),
        }
    }
}

/// Role gate for the student API surface.
pub struct RequireStudent(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for RequireStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        match session.role() {
            Some(Role::Student) => Ok(RequireStudent(session.profile)),
            _ => Err(ApiError::AccessDenied),
        }
    }
}

/// Best-effort session resolution for navigable shell routes. Never
/// rejects: an absent or invalid token is simply an unauthenticated
/// session.
pub struct MaybeSession(pub SessionState);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeSession(SessionState::Unauthenticated));
        };
        let claims = match keys.verify(token) {
            Ok(c) if c.kind == TokenKind::Access => c,
            _ => return Ok(MaybeSession(SessionState::Unauthenticated)),
        };
        let role = match profiles_repo::find_by_id(&state.db, claims.sub).await {
            Ok(Some(profile)) => profile.role(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "profile lookup failed during session resolve");
                None
            }
        };
        Ok(MaybeSession(SessionState::Authenticated { role }))
    }
}
