mod app;
mod auth;
mod chat;
mod config;
mod db;
mod error;
mod oauth;
mod projects;
mod state;
mod storage;
#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fiftytwo=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.listen_addr()?;
    let state = AppState::init(config).await?;

    if let Some(seed) = state.config.admin.clone() {
        if let Err(e) = auth::services::seed_admin(&state, &seed).await {
            tracing::warn!(error = %e, "admin seeding failed; continuing");
        }
    }

    app::serve(app::build_app(state), addr).await
}
