use serde::Deserialize;

/// Student submit payload. At least one of the three content fields must
/// be present.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub content_text: Option<String>,
    pub file_url: Option<String>,
    pub link_url: Option<String>,
}

impl SubmitRequest {
    pub fn has_content(&self) -> bool {
        [&self.content_text, &self.file_url, &self.link_url]
            .iter()
            .any(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    /// reviewed or revision_requested
    pub status: String,
    pub grade: Option<String>,
    pub feedback: Option<String>,
}

pub const GRADING_STATUSES: &[&str] = &["reviewed", "revision_requested"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_requires_some_content() {
        assert!(!SubmitRequest::default().has_content());
        assert!(!SubmitRequest {
            content_text: Some("   ".into()),
            ..Default::default()
        }
        .has_content());
        assert!(SubmitRequest {
            link_url: Some("https://x".into()),
            ..Default::default()
        }
        .has_content());
    }
}
