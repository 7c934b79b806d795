use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::profiles::dto::UpdateProfileRequest;

/// Role carried by a profile row. The authenticated identity alone has no
/// role; it is always read from the profile, never from client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Home route of this role's navigable region.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Student => "/dashboard",
            Role::Admin => "/admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub initials: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub cohort_id: Option<Uuid>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Profile {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

const PROFILE_COLUMNS: &str = r#"id, full_name, email, initials, avatar_url, role, cohort_id,
       bio, github_username, linkedin_url, website_url, location, created_at, updated_at"#;

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Insert the profile half of a new account inside the registration
/// transaction. Role always starts as student.
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    full_name: &str,
    email: &str,
    initials: Option<&str>,
) -> sqlx::Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        INSERT INTO profiles (id, full_name, email, initials, role)
        VALUES ($1, $2, $3, $4, 'student')
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(full_name)
    .bind(email)
    .bind(initials)
    .fetch_one(&mut **tx)
    .await
}

/// Patch semantics: fields left out of the request keep their stored value.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    updates: &UpdateProfileRequest,
) -> sqlx::Result<Profile> {
    sqlx::query_as::<_, Profile>(&format!(
        r#"
        UPDATE profiles
           SET full_name       = COALESCE($2, full_name),
               initials        = COALESCE($3, initials),
               avatar_url      = COALESCE($4, avatar_url),
               bio             = COALESCE($5, bio),
               github_username = COALESCE($6, github_username),
               linkedin_url    = COALESCE($7, linkedin_url),
               website_url     = COALESCE($8, website_url),
               location        = COALESCE($9, location),
               updated_at      = now()
         WHERE id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&updates.full_name)
    .bind(&updates.initials)
    .bind(&updates.avatar_url)
    .bind(&updates.bio)
    .bind(&updates.github_username)
    .bind(&updates.linkedin_url)
    .bind(&updates.website_url)
    .bind(&updates.location)
    .fetch_one(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_strict() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_home_paths() {
        assert_eq!(Role::Student.home_path(), "/dashboard");
        assert_eq!(Role::Admin.home_path(), "/admin");
    }
}
