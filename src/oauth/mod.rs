use crate::state::AppState;
use axum::Router;

pub mod github;
pub mod handlers;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::github_routes()
}
