use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    error::{AppResult, Json},
    projects::{
        dto::{CreateProjectRequest, MessageResponse, ProjectStats, StatusRequest, UpdateProjectRequest},
        repo_types::Project,
        services::{self, parse_project_id},
    },
    state::AppState,
};

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", put(update_project).delete(delete_project))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/projects/stats", get(project_stats))
        .route("/admin/projects/:id/status", put(set_status))
        .route("/admin/projects/:id", delete(hide_project))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_projects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(services::list_projects(&state, &user).await?))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = services::create_project(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<Json<Project>> {
    let id = parse_project_id(&id)?;
    Ok(Json(services::update_project(&state, &user, id, payload).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_project_id(&id)?;
    services::delete_project(&state, &user, id).await?;
    Ok(Json(MessageResponse {
        message: "Project deleted successfully".into(),
    }))
}

#[instrument(skip_all)]
pub async fn project_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ProjectStats>> {
    Ok(Json(services::stats(&state).await?))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.id))]
pub async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<Project>> {
    let id = parse_project_id(&id)?;
    Ok(Json(services::set_status(&state, &admin, id, &payload.status).await?))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn hide_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_project_id(&id)?;
    services::hide_project(&state, &admin, id).await?;
    Ok(Json(MessageResponse {
        message: "Project hidden from admin view".into(),
    }))
}
