use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::submissions::dto::SubmitRequest;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub content_text: Option<String>,
    pub file_url: Option<String>,
    pub link_url: Option<String>,
    pub status: String,
    pub grade: Option<String>,
    pub admin_feedback: Option<String>,
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
}

/// Submission with the submitting student's display fields attached for
/// the admin review list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionWithStudent {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub content_text: Option<String>,
    pub file_url: Option<String>,
    pub link_url: Option<String>,
    pub status: String,
    pub grade: Option<String>,
    pub admin_feedback: Option<String>,
    pub submitted_at: OffsetDateTime,
    pub reviewed_at: Option<OffsetDateTime>,
    pub student_name: String,
    pub student_email: String,
    pub student_initials: Option<String>,
    pub student_avatar_url: Option<String>,
}

const SUBMISSION_COLUMNS: &str = r#"id, assignment_id, student_id, content_text, file_url, link_url,
       status, grade, admin_feedback, submitted_at, reviewed_at"#;

pub async fn list_by_assignment(
    db: &PgPool,
    assignment_id: Uuid,
) -> sqlx::Result<Vec<SubmissionWithStudent>> {
    sqlx::query_as::<_, SubmissionWithStudent>(
        r#"
        SELECT s.id, s.assignment_id, s.student_id, s.content_text, s.file_url,
               s.link_url, s.status, s.grade, s.admin_feedback, s.submitted_at,
               s.reviewed_at,
               p.full_name  AS student_name,
               p.email      AS student_email,
               p.initials   AS student_initials,
               p.avatar_url AS student_avatar_url
          FROM submissions s
          JOIN profiles p ON p.id = s.student_id
         WHERE s.assignment_id = $1
         ORDER BY s.submitted_at ASC
        "#,
    )
    .bind(assignment_id)
    .fetch_all(db)
    .await
}

pub async fn list_by_student(db: &PgPool, student_id: Uuid) -> sqlx::Result<Vec<Submission>> {
    sqlx::query_as::<_, Submission>(&format!(
        r#"
        SELECT {SUBMISSION_COLUMNS}
          FROM submissions
         WHERE student_id = $1
         ORDER BY submitted_at DESC
        "#
    ))
    .bind(student_id)
    .fetch_all(db)
    .await
}

pub async fn find_for_student(
    db: &PgPool,
    assignment_id: Uuid,
    student_id: Uuid,
) -> sqlx::Result<Option<Submission>> {
    sqlx::query_as::<_, Submission>(&format!(
        r#"
        SELECT {SUBMISSION_COLUMNS}
          FROM submissions
         WHERE assignment_id = $1 AND student_id = $2
        "#
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(db)
    .await
}

/// One submission per (assignment, student): resubmitting replaces the
/// content, resets the status to submitted, and clears any prior review.
pub async fn upsert(
    db: &PgPool,
    assignment_id: Uuid,
    student_id: Uuid,
    req: &SubmitRequest,
) -> sqlx::Result<Submission> {
    sqlx::query_as::<_, Submission>(&format!(
        r#"
        INSERT INTO submissions (assignment_id, student_id, content_text, file_url, link_url)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (assignment_id, student_id) DO UPDATE
           SET content_text   = EXCLUDED.content_text,
               file_url       = EXCLUDED.file_url,
               link_url       = EXCLUDED.link_url,
               status         = 'submitted',
               grade          = NULL,
               admin_feedback = NULL,
               submitted_at   = now(),
               reviewed_at    = NULL
        RETURNING {SUBMISSION_COLUMNS}
        "#
    ))
    .bind(assignment_id)
    .bind(student_id)
    .bind(&req.content_text)
    .bind(&req.file_url)
    .bind(&req.link_url)
    .fetch_one(db)
    .await
}

/// Status, grade, feedback, and reviewed_at change in one statement so a
/// read immediately after grading never sees a partial review.
pub async fn grade(
    db: &PgPool,
    id: Uuid,
    status: &str,
    grade: Option<&str>,
    feedback: Option<&str>,
) -> sqlx::Result<Submission> {
    sqlx::query_as::<_, Submission>(&format!(
        r#"
        UPDATE submissions
           SET status         = $2,
               grade          = $3,
               admin_feedback = $4,
               reviewed_at    = now()
         WHERE id = $1
        RETURNING {SUBMISSION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(grade)
    .bind(feedback)
    .fetch_one(db)
    .await
}
