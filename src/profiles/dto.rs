use serde::{Deserialize, Serialize};

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub initials: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub url: String,
}
