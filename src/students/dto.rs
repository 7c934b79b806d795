use serde::Deserialize;
use uuid::Uuid;

/// `cohort_id: null` unassigns the student.
#[derive(Debug, Deserialize)]
pub struct AssignCohortRequest {
    pub cohort_id: Option<Uuid>,
}
