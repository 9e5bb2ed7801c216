use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "Approved")]
    Approved,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "Not Started",
            ProjectStatus::UnderReview => "Under Review",
            ProjectStatus::Approved => "Approved",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Started" => Ok(ProjectStatus::NotStarted),
            "Under Review" => Ok(ProjectStatus::UnderReview),
            "Approved" => Ok(ProjectStatus::Approved),
            other => anyhow::bail!("unknown project status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    pub week: i32,
    pub status: ProjectStatus,
    pub github_repo: Option<String>,
    pub url: Option<String>,
    pub user_id: Uuid,
    pub user_name: String,
    pub hidden: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    pub week: i32,
    pub status: String,
    pub github_repo: Option<String>,
    pub url: Option<String>,
    pub user_id: Uuid,
    pub user_name: String,
    pub hidden: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(r: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            tech_stack: r.tech_stack,
            week: r.week,
            status: r.status.parse()?,
            github_repo: r.github_repo,
            url: r.url,
            user_id: r.user_id,
            user_name: r.user_name,
            hidden: r.hidden,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub user_id: Uuid,
    pub user_name: String,
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    pub week: i32,
    pub status: ProjectStatus,
    pub github_repo: Option<String>,
    pub url: Option<String>,
}

/// Owner-editable fields after a patch has been merged onto the stored project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectChanges {
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    pub week: i32,
    pub github_repo: Option<String>,
    pub url: Option<String>,
}

impl From<&Project> for ProjectChanges {
    fn from(p: &Project) -> Self {
        Self {
            title: p.title.clone(),
            description: p.description.clone(),
            tech_stack: p.tech_stack.clone(),
            week: p.week,
            github_repo: p.github_repo.clone(),
            url: p.url.clone(),
        }
    }
}
