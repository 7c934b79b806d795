use serde::{Deserialize, Serialize};

use crate::assignments::repo::Assignment;
use crate::submissions::repo::Submission;

/// An assignment as the student sees it: the stored row plus the status
/// derived from their own submission, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentWithStatus {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub status: String,
    pub submission: Option<Submission>,
}

pub const STATUS_PENDING: &str = "pending";

/// Effective status is never stored: "pending" unless the student has a
/// submission, in which case the submission's own status is used
/// verbatim. Pure; recomputed whenever either input list changes.
pub fn derive_statuses(
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
) -> Vec<AssignmentWithStatus> {
    assignments
        .into_iter()
        .map(|assignment| {
            let submission = submissions
                .iter()
                .find(|s| s.assignment_id == assignment.id)
                .cloned();
            let status = submission
                .as_ref()
                .map(|s| s.status.clone())
                .unwrap_or_else(|| STATUS_PENDING.to_string());
            AssignmentWithStatus {
                assignment,
                status,
                submission,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn assignment(id: Uuid) -> Assignment {
        Assignment {
            id,
            cohort_id: Uuid::new_v4(),
            module_id: None,
            title: "A1".into(),
            description: None,
            due_date: None,
            is_published: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn submission(assignment_id: Uuid, status: &str) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            assignment_id,
            student_id: Uuid::new_v4(),
            content_text: None,
            file_url: None,
            link_url: Some("https://x".into()),
            status: status.into(),
            grade: None,
            admin_feedback: None,
            submitted_at: OffsetDateTime::now_utc(),
            reviewed_at: None,
        }
    }

    #[test]
    fn assignment_without_submission_is_pending() {
        let derived = derive_statuses(vec![assignment(Uuid::new_v4())], vec![]);
        assert_eq!(derived[0].status, "pending");
        assert!(derived[0].submission.is_none());
    }

    #[test]
    fn submission_status_is_used_verbatim() {
        let a1 = Uuid::new_v4();
        let a2 = Uuid::new_v4();
        let derived = derive_statuses(
            vec![assignment(a1), assignment(a2)],
            vec![submission(a1, "revision_requested")],
        );
        assert_eq!(derived[0].status, "revision_requested");
        assert_eq!(derived[1].status, "pending");
    }

    #[test]
    fn unrelated_submissions_do_not_leak() {
        let derived = derive_statuses(
            vec![assignment(Uuid::new_v4())],
            vec![submission(Uuid::new_v4(), "reviewed")],
        );
        assert_eq!(derived[0].status, "pending");
    }

    #[test]
    fn derivation_preserves_assignment_order() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let derived = derive_statuses(ids.iter().map(|id| assignment(*id)).collect(), vec![]);
        let out: Vec<Uuid> = derived.iter().map(|d| d.assignment.id).collect();
        assert_eq!(out, ids);
    }
}
