use serde::{Deserialize, Serialize};

use crate::projects::repo_types::ProjectStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    pub week: i32,
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Owner patch. Omitted fields keep their stored value; ownership, status and
/// visibility fields are not accepted here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tech_stack: Option<String>,
    pub week: Option<i32>,
    pub github_repo: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total: usize,
    pub approved: usize,
    pub under_review: usize,
    pub not_started: usize,
}

impl ProjectStats {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a ProjectStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.total += 1;
            match status {
                ProjectStatus::Approved => stats.approved += 1,
                ProjectStatus::UnderReview => stats.under_review += 1,
                ProjectStatus::NotStarted => stats.not_started += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
