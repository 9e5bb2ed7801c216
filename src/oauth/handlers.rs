use axum::{extract::State, routing::post, Router};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::dto::AuthResponse,
    error::{AppResult, Json},
    oauth::services::exchange_and_resolve_user,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CodeExchangeRequest {
    pub code: String,
}

pub fn github_routes() -> Router<AppState> {
    Router::new().route("/github/token", post(github_token))
}

#[instrument(skip_all)]
pub async fn github_token(
    State(state): State<AppState>,
    Json(payload): Json<CodeExchangeRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, tokens) = exchange_and_resolve_user(&state, &payload.code).await?;
    Ok(Json(AuthResponse::new(tokens, &user)))
}
