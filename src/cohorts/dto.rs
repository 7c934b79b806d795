use serde::Deserialize;
use time::Date;

#[derive(Debug, Deserialize)]
pub struct CreateCohortRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub max_students: Option<i32>,
    pub is_active: Option<bool>,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCohortRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub max_students: Option<i32>,
    pub is_active: Option<bool>,
}
