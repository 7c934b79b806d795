use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::assignments::dto::{CreateAssignmentRequest, UpdateAssignmentRequest};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

/// Assignment with cohort name and live submission count for the admin
/// list, aggregated in one query rather than one count per row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignmentSummary {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
    pub cohort_name: String,
    pub submission_count: i64,
}

const ASSIGNMENT_COLUMNS: &str = r#"id, cohort_id, module_id, title, description, due_date, is_published, created_at"#;

pub async fn list_all(db: &PgPool) -> sqlx::Result<Vec<AssignmentSummary>> {
    sqlx::query_as::<_, AssignmentSummary>(
        r#"
        SELECT a.id, a.cohort_id, a.module_id, a.title, a.description,
               a.due_date, a.is_published, a.created_at,
               c.name AS cohort_name,
               COUNT(s.id) AS submission_count
          FROM assignments a
          JOIN cohorts c ON c.id = a.cohort_id
          LEFT JOIN submissions s ON s.assignment_id = a.id
         GROUP BY a.id, c.name
         ORDER BY a.created_at DESC
        "#,
    )
    .fetch_all(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
    ))
    .bind(id)
    .fetch_one(db)
    .await
}

/// Assignment as visible to a student of the given cohort.
pub async fn get_published_for_cohort(
    db: &PgPool,
    id: Uuid,
    cohort_id: Uuid,
) -> sqlx::Result<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        r#"
        SELECT {ASSIGNMENT_COLUMNS}
          FROM assignments
         WHERE id = $1 AND cohort_id = $2 AND is_published = TRUE
        "#
    ))
    .bind(id)
    .bind(cohort_id)
    .fetch_one(db)
    .await
}

pub async fn list_published_by_cohort(
    db: &PgPool,
    cohort_id: Uuid,
) -> sqlx::Result<Vec<Assignment>> {
    sqlx::query_as::<_, Assignment>(&format!(
        r#"
        SELECT {ASSIGNMENT_COLUMNS}
          FROM assignments
         WHERE cohort_id = $1 AND is_published = TRUE
         ORDER BY due_date ASC NULLS LAST
        "#
    ))
    .bind(cohort_id)
    .fetch_all(db)
    .await
}

pub async fn create(db: &PgPool, req: &CreateAssignmentRequest) -> sqlx::Result<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        r#"
        INSERT INTO assignments (cohort_id, module_id, title, description, due_date, is_published)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, FALSE))
        RETURNING {ASSIGNMENT_COLUMNS}
        "#
    ))
    .bind(req.cohort_id)
    .bind(req.module_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.due_date)
    .bind(req.is_published)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: Uuid, req: &UpdateAssignmentRequest) -> sqlx::Result<Assignment> {
    sqlx::query_as::<_, Assignment>(&format!(
        r#"
        UPDATE assignments
           SET title        = COALESCE($2, title),
               description  = COALESCE($3, description),
               due_date     = COALESCE($4, due_date),
               is_published = COALESCE($5, is_published),
               module_id    = COALESCE($6, module_id)
         WHERE id = $1
        RETURNING {ASSIGNMENT_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.due_date)
    .bind(req.is_published)
    .bind(req.module_id)
    .fetch_one(db)
    .await
}

/// Submissions cascade with the assignment.
pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
