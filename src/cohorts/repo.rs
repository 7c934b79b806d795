use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::cohorts::dto::{CreateCohortRequest, UpdateCohortRequest};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cohort {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub max_students: Option<i32>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Cohort with its live student count, aggregated in one query rather
/// than one count per row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CohortSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub max_students: Option<i32>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub student_count: i64,
}

const SUMMARY_QUERY: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.start_date, c.end_date,
           c.max_students, c.is_active, c.created_at,
           COUNT(p.id) AS student_count
      FROM cohorts c
      LEFT JOIN profiles p ON p.cohort_id = c.id AND p.role = 'student'
"#;

pub async fn list(db: &PgPool) -> sqlx::Result<Vec<CohortSummary>> {
    sqlx::query_as::<_, CohortSummary>(&format!(
        "{SUMMARY_QUERY} GROUP BY c.id ORDER BY c.created_at DESC"
    ))
    .fetch_all(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<CohortSummary> {
    sqlx::query_as::<_, CohortSummary>(&format!(
        "{SUMMARY_QUERY} WHERE c.id = $1 GROUP BY c.id"
    ))
    .bind(id)
    .fetch_one(db)
    .await
}

pub async fn create(db: &PgPool, req: &CreateCohortRequest) -> sqlx::Result<Cohort> {
    sqlx::query_as::<_, Cohort>(
        r#"
        INSERT INTO cohorts (name, slug, description, start_date, end_date, max_students, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, TRUE))
        RETURNING id, name, slug, description, start_date, end_date, max_students, is_active, created_at
        "#,
    )
    .bind(&req.name)
    .bind(&req.slug)
    .bind(&req.description)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.max_students)
    .bind(req.is_active)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: Uuid, req: &UpdateCohortRequest) -> sqlx::Result<Cohort> {
    sqlx::query_as::<_, Cohort>(
        r#"
        UPDATE cohorts
           SET name         = COALESCE($2, name),
               slug         = COALESCE($3, slug),
               description  = COALESCE($4, description),
               start_date   = COALESCE($5, start_date),
               end_date     = COALESCE($6, end_date),
               max_students = COALESCE($7, max_students),
               is_active    = COALESCE($8, is_active)
         WHERE id = $1
        RETURNING id, name, slug, description, start_date, end_date, max_students, is_active, created_at
        "#,
    )
    .bind(id)
    .bind(&req.name)
    .bind(&req.slug)
    .bind(&req.description)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.max_students)
    .bind(req.is_active)
    .fetch_one(db)
    .await
}

/// Children (modules, lessons, materials, assignments) go with the cohort
/// via foreign-key cascade.
pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM cohorts WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
