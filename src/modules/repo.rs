use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::modules::dto::{
    CreateLessonRequest, CreateMaterialRequest, CreateModuleRequest, UpdateLessonRequest,
    UpdateMaterialRequest, UpdateModuleRequest,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Module {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub is_published: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub order_index: i32,
    pub duration_minutes: Option<i32>,
    pub status: String,
    pub is_published: bool,
    pub date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Material {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: String,
    pub created_at: OffsetDateTime,
}

/// Module with its lessons attached, both ordered by order_index, so the
/// caller never needs a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleWithLessons {
    #[serde(flatten)]
    pub module: Module,
    pub lessons: Vec<Lesson>,
}

pub async fn list_by_cohort(
    db: &PgPool,
    cohort_id: Uuid,
    published_only: bool,
) -> sqlx::Result<Vec<ModuleWithLessons>> {
    let mut modules_sql = String::from(
        r#"
        SELECT id, cohort_id, title, description, order_index, is_published, created_at
          FROM modules
         WHERE cohort_id = $1
        "#,
    );
    if published_only {
        modules_sql.push_str(" AND is_published = TRUE");
    }
    modules_sql.push_str(" ORDER BY order_index ASC");

    let modules = sqlx::query_as::<_, Module>(&modules_sql)
        .bind(cohort_id)
        .fetch_all(db)
        .await?;

    let module_ids: Vec<Uuid> = modules.iter().map(|m| m.id).collect();
    let mut lessons_sql = String::from(
        r#"
        SELECT id, module_id, title, description, video_url, order_index,
               duration_minutes, status, is_published, date, created_at
          FROM lessons
         WHERE module_id = ANY($1)
        "#,
    );
    if published_only {
        lessons_sql.push_str(" AND is_published = TRUE");
    }
    lessons_sql.push_str(" ORDER BY order_index ASC");

    let lessons = sqlx::query_as::<_, Lesson>(&lessons_sql)
        .bind(&module_ids)
        .fetch_all(db)
        .await?;

    let mut by_module: HashMap<Uuid, Vec<Lesson>> = HashMap::new();
    for lesson in lessons {
        by_module.entry(lesson.module_id).or_default().push(lesson);
    }

    Ok(modules
        .into_iter()
        .map(|module| {
            let lessons = by_module.remove(&module.id).unwrap_or_default();
            ModuleWithLessons { module, lessons }
        })
        .collect())
}

/// Whether a lesson is published and belongs to the given cohort. Used to
/// scope student reads.
pub async fn lesson_visible_to_cohort(
    db: &PgPool,
    lesson_id: Uuid,
    cohort_id: Uuid,
) -> sqlx::Result<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1
              FROM lessons l
              JOIN modules m ON m.id = l.module_id
             WHERE l.id = $1
               AND m.cohort_id = $2
               AND l.is_published = TRUE
               AND m.is_published = TRUE
        )
        "#,
    )
    .bind(lesson_id)
    .bind(cohort_id)
    .fetch_one(db)
    .await?;
    Ok(exists)
}

// --- modules ---

pub async fn create_module(db: &PgPool, req: &CreateModuleRequest) -> sqlx::Result<Module> {
    sqlx::query_as::<_, Module>(
        r#"
        INSERT INTO modules (cohort_id, title, description, order_index, is_published)
        VALUES ($1, $2, $3, $4, COALESCE($5, FALSE))
        RETURNING id, cohort_id, title, description, order_index, is_published, created_at
        "#,
    )
    .bind(req.cohort_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.order_index)
    .bind(req.is_published)
    .fetch_one(db)
    .await
}

pub async fn update_module(db: &PgPool, id: Uuid, req: &UpdateModuleRequest) -> sqlx::Result<Module> {
    sqlx::query_as::<_, Module>(
        r#"
        UPDATE modules
           SET title        = COALESCE($2, title),
               description  = COALESCE($3, description),
               order_index  = COALESCE($4, order_index),
               is_published = COALESCE($5, is_published)
         WHERE id = $1
        RETURNING id, cohort_id, title, description, order_index, is_published, created_at
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.order_index)
    .bind(req.is_published)
    .fetch_one(db)
    .await
}

/// Lessons and their materials cascade with the module.
pub async fn delete_module(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM modules WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

// --- lessons ---

pub async fn create_lesson(db: &PgPool, req: &CreateLessonRequest) -> sqlx::Result<Lesson> {
    sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (module_id, title, description, video_url, order_index,
                             duration_minutes, status, is_published, date)
        VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'draft'), COALESCE($8, FALSE), $9)
        RETURNING id, module_id, title, description, video_url, order_index,
                  duration_minutes, status, is_published, date, created_at
        "#,
    )
    .bind(req.module_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.video_url)
    .bind(req.order_index)
    .bind(req.duration_minutes)
    .bind(&req.status)
    .bind(req.is_published)
    .bind(req.date)
    .fetch_one(db)
    .await
}

pub async fn update_lesson(db: &PgPool, id: Uuid, req: &UpdateLessonRequest) -> sqlx::Result<Lesson> {
    sqlx::query_as::<_, Lesson>(
        r#"
        UPDATE lessons
           SET title            = COALESCE($2, title),
               description      = COALESCE($3, description),
               video_url        = COALESCE($4, video_url),
               order_index      = COALESCE($5, order_index),
               duration_minutes = COALESCE($6, duration_minutes),
               status           = COALESCE($7, status),
               is_published     = COALESCE($8, is_published),
               date             = COALESCE($9, date)
         WHERE id = $1
        RETURNING id, module_id, title, description, video_url, order_index,
                  duration_minutes, status, is_published, date, created_at
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.video_url)
    .bind(req.order_index)
    .bind(req.duration_minutes)
    .bind(&req.status)
    .bind(req.is_published)
    .bind(req.date)
    .fetch_one(db)
    .await
}

pub async fn delete_lesson(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

// --- materials ---

pub async fn list_materials(db: &PgPool, lesson_id: Uuid) -> sqlx::Result<Vec<Material>> {
    sqlx::query_as::<_, Material>(
        r#"
        SELECT id, lesson_id, title, type, file_url, created_at
          FROM lesson_materials
         WHERE lesson_id = $1
         ORDER BY created_at ASC
        "#,
    )
    .bind(lesson_id)
    .fetch_all(db)
    .await
}

pub async fn create_material(db: &PgPool, req: &CreateMaterialRequest) -> sqlx::Result<Material> {
    sqlx::query_as::<_, Material>(
        r#"
        INSERT INTO lesson_materials (lesson_id, title, type, file_url)
        VALUES ($1, $2, $3, $4)
        RETURNING id, lesson_id, title, type, file_url, created_at
        "#,
    )
    .bind(req.lesson_id)
    .bind(&req.title)
    .bind(&req.kind)
    .bind(&req.file_url)
    .fetch_one(db)
    .await
}

pub async fn update_material(
    db: &PgPool,
    id: Uuid,
    req: &UpdateMaterialRequest,
) -> sqlx::Result<Material> {
    sqlx::query_as::<_, Material>(
        r#"
        UPDATE lesson_materials
           SET title    = COALESCE($2, title),
               type     = COALESCE($3, type),
               file_url = COALESCE($4, file_url)
         WHERE id = $1
        RETURNING id, lesson_id, title, type, file_url, created_at
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.kind)
    .bind(&req.file_url)
    .fetch_one(db)
    .await
}

pub async fn delete_material(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("DELETE FROM lesson_materials WHERE id = $1 RETURNING lesson_id")
            .bind(id)
            .fetch_optional(db)
            .await?;
    Ok(row.map(|(lesson_id,)| lesson_id))
}
