use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateModuleRequest {
    pub cohort_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateModuleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order_index: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLessonRequest {
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub order_index: i32,
    pub duration_minutes: Option<i32>,
    pub status: Option<String>,
    pub is_published: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLessonRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub order_index: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub status: Option<String>,
    pub is_published: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

fn default_material_kind() -> String {
    "link".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    pub lesson_id: Uuid,
    pub title: String,
    #[serde(rename = "type", default = "default_material_kind")]
    pub kind: String,
    pub file_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub file_url: Option<String>,
}

pub const MATERIAL_KINDS: &[&str] = &["link", "pdf", "file"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn material_kind_defaults_to_link() {
        let req: CreateMaterialRequest = serde_json::from_value(json!({
            "lesson_id": Uuid::new_v4(),
            "title": "Slides",
            "file_url": "https://files.test/materials/slides.pdf",
        }))
        .expect("payload without type deserializes");
        assert_eq!(req.kind, "link");
    }

    #[test]
    fn material_kind_is_read_from_type_field() {
        let req: CreateMaterialRequest = serde_json::from_value(json!({
            "lesson_id": Uuid::new_v4(),
            "title": "Slides",
            "type": "pdf",
            "file_url": "https://files.test/materials/slides.pdf",
        }))
        .expect("payload with type deserializes");
        assert_eq!(req.kind, "pdf");
    }
}
