use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    projects::{
        dto::{CreateProjectRequest, ProjectStats, UpdateProjectRequest},
        repo_types::{NewProject, Project, ProjectChanges, ProjectStatus},
    },
    state::AppState,
};

pub const FIRST_WEEK: i32 = 1;
pub const LAST_WEEK: i32 = 52;

pub fn validate_week(week: i32) -> AppResult<()> {
    if !(FIRST_WEEK..=LAST_WEEK).contains(&week) {
        return Err(AppError::Validation(format!(
            "Week must be between {FIRST_WEEK} and {LAST_WEEK}"
        )));
    }
    Ok(())
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_project_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid project ID".into()))
}

async fn ensure_week_free(
    state: &AppState,
    owner: Uuid,
    week: i32,
    except: Option<Uuid>,
) -> AppResult<()> {
    if let Some(existing) = state.projects.find_by_week(owner, week).await? {
        if Some(existing.id) != except {
            return Err(AppError::Conflict(format!(
                "You already have a project for week {week}"
            )));
        }
    }
    Ok(())
}

pub async fn create_project(
    state: &AppState,
    owner: &User,
    req: CreateProjectRequest,
) -> AppResult<Project> {
    validate_week(req.week)?;
    let new = NewProject {
        user_id: owner.id,
        user_name: owner.display_name(),
        title: required("Title", &req.title)?,
        description: required("Description", &req.description)?,
        tech_stack: required("Tech stack", &req.tech_stack)?,
        week: req.week,
        status: ProjectStatus::UnderReview,
        github_repo: optional(req.github_repo),
        url: optional(req.url),
    };
    ensure_week_free(state, owner.id, new.week, None).await?;

    let project = state.projects.create(new).await?;
    info!(project_id = %project.id, user_id = %owner.id, week = project.week, "project submitted");
    Ok(project)
}

/// Projects the viewer's dashboard shows: their own, or for an admin every unhidden one.
pub async fn list_projects(state: &AppState, viewer: &User) -> AppResult<Vec<Project>> {
    let projects = if viewer.is_admin() {
        state.projects.list_unhidden().await?
    } else {
        state.projects.list_by_owner(viewer.id).await?
    };
    Ok(projects)
}

/// Merge an owner patch onto the stored fields.
pub fn merge_patch(current: &Project, patch: UpdateProjectRequest) -> AppResult<ProjectChanges> {
    let mut changes = ProjectChanges::from(current);
    if let Some(title) = patch.title {
        changes.title = required("Title", &title)?;
    }
    if let Some(description) = patch.description {
        changes.description = required("Description", &description)?;
    }
    if let Some(tech_stack) = patch.tech_stack.filter(|t| !t.trim().is_empty()) {
        changes.tech_stack = tech_stack.trim().to_string();
    }
    if let Some(week) = patch.week {
        validate_week(week)?;
        changes.week = week;
    }
    if patch.github_repo.is_some() {
        changes.github_repo = optional(patch.github_repo);
    }
    if patch.url.is_some() {
        changes.url = optional(patch.url);
    }
    Ok(changes)
}

pub async fn update_project(
    state: &AppState,
    owner: &User,
    id: Uuid,
    patch: UpdateProjectRequest,
) -> AppResult<Project> {
    let current = state
        .projects
        .find_owned(id, owner.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;

    let changes = merge_patch(&current, patch)?;
    if changes.week != current.week {
        ensure_week_free(state, owner.id, changes.week, Some(id)).await?;
    }

    let updated = state
        .projects
        .update_owned(id, owner.id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    info!(project_id = %id, user_id = %owner.id, "project updated");
    Ok(updated)
}

pub async fn delete_project(state: &AppState, owner: &User, id: Uuid) -> AppResult<()> {
    if !state.projects.delete_owned(id, owner.id).await? {
        return Err(AppError::NotFound("Project not found".into()));
    }
    info!(project_id = %id, user_id = %owner.id, "project deleted");
    Ok(())
}

pub async fn set_status(
    state: &AppState,
    admin: &User,
    id: Uuid,
    status: &str,
) -> AppResult<Project> {
    let status: ProjectStatus = status.parse().map_err(|_| {
        AppError::Validation("Status must be one of Not Started, Under Review, Approved".into())
    })?;
    let project = state
        .projects
        .set_status(id, status)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".into()))?;
    info!(project_id = %id, admin_id = %admin.id, status = status.as_str(), "project status changed");
    Ok(project)
}

/// Admin-side delete: the project leaves admin listings but stays in storage.
pub async fn hide_project(state: &AppState, admin: &User, id: Uuid) -> AppResult<()> {
    if !state.projects.hide(id).await? {
        warn!(project_id = %id, "hide on unknown project");
        return Err(AppError::NotFound("Project not found".into()));
    }
    info!(project_id = %id, admin_id = %admin.id, "project hidden");
    Ok(())
}

pub async fn stats(state: &AppState) -> AppResult<ProjectStats> {
    let projects = state.projects.list_unhidden().await?;
    Ok(ProjectStats::tally(projects.iter().map(|p| &p.status)))
}
