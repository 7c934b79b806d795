use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A row exists only for completed lessons; un-completing deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LessonProgress {
    pub id: Uuid,
    pub student_id: Uuid,
    pub lesson_id: Uuid,
    pub completed: bool,
    pub completed_at: OffsetDateTime,
}

pub async fn list_by_student(db: &PgPool, student_id: Uuid) -> sqlx::Result<Vec<LessonProgress>> {
    sqlx::query_as::<_, LessonProgress>(
        r#"
        SELECT id, student_id, lesson_id, completed, completed_at
          FROM lesson_progress
         WHERE student_id = $1
         ORDER BY completed_at ASC
        "#,
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}

/// Marking a lesson complete twice is a no-op; the first completion
/// timestamp is kept.
pub async fn mark_complete(
    db: &PgPool,
    student_id: Uuid,
    lesson_id: Uuid,
) -> sqlx::Result<LessonProgress> {
    sqlx::query_as::<_, LessonProgress>(
        r#"
        INSERT INTO lesson_progress (student_id, lesson_id)
        VALUES ($1, $2)
        ON CONFLICT (student_id, lesson_id) DO UPDATE
           SET completed = TRUE
        RETURNING id, student_id, lesson_id, completed, completed_at
        "#,
    )
    .bind(student_id)
    .bind(lesson_id)
    .fetch_one(db)
    .await
}

pub async fn mark_incomplete(db: &PgPool, student_id: Uuid, lesson_id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM lesson_progress WHERE student_id = $1 AND lesson_id = $2",
    )
    .bind(student_id)
    .bind(lesson_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
