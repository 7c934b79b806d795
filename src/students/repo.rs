use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub initials: Option<String>,
    pub avatar_url: Option<String>,
    pub cohort_id: Option<Uuid>,
    pub cohort_name: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Student detail for the admin view: profile fields plus activity
/// counts, all gathered in one statement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentDetail {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub initials: Option<String>,
    pub avatar_url: Option<String>,
    pub cohort_id: Option<Uuid>,
    pub cohort_name: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
    pub completed_lessons: i64,
    pub submitted_assignments: i64,
}

pub async fn list(db: &PgPool) -> sqlx::Result<Vec<StudentSummary>> {
    sqlx::query_as::<_, StudentSummary>(
        r#"
        SELECT p.id, p.full_name, p.email, p.initials, p.avatar_url,
               p.cohort_id, c.name AS cohort_name, p.location, p.created_at
          FROM profiles p
          LEFT JOIN cohorts c ON c.id = p.cohort_id
         WHERE p.role = 'student'
         ORDER BY p.created_at DESC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<StudentDetail> {
    sqlx::query_as::<_, StudentDetail>(
        r#"
        SELECT p.id, p.full_name, p.email, p.initials, p.avatar_url,
               p.cohort_id, c.name AS cohort_name,
               p.bio, p.github_username, p.linkedin_url, p.website_url,
               p.location, p.created_at,
               COUNT(DISTINCT lp.id) AS completed_lessons,
               COUNT(DISTINCT s.id)  AS submitted_assignments
          FROM profiles p
          LEFT JOIN cohorts c ON c.id = p.cohort_id
          LEFT JOIN lesson_progress lp ON lp.student_id = p.id
          LEFT JOIN submissions s ON s.student_id = p.id
         WHERE p.id = $1 AND p.role = 'student'
         GROUP BY p.id, c.name
        "#,
    )
    .bind(id)
    .fetch_one(db)
    .await
}

/// Assign or unassign a student's cohort. NULL clears the assignment.
pub async fn set_cohort(
    db: &PgPool,
    id: Uuid,
    cohort_id: Option<Uuid>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE profiles
           SET cohort_id = $2, updated_at = now()
         WHERE id = $1 AND role = 'student'
        "#,
    )
    .bind(id)
    .bind(cohort_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
