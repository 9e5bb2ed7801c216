use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::TokenPair,
        jwt::JwtKeys,
        repo_types::{GithubLink, NewUser, Provider, Role, User},
        services::{normalize_email, sign_pair},
    },
    error::{AppError, AppResult},
    oauth::github::{primary_email, OAuthError},
    state::AppState,
};

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

/// Exchange a GitHub authorization code and resolve (or create) the local account.
///
/// Resolution order: GitHub id, then verified primary email (linking the
/// GitHub identity onto that account), then a fresh `user` account. The new
/// session is written in the same store call that creates or links the user.
pub async fn exchange_and_resolve_user(state: &AppState, code: &str) -> AppResult<(User, TokenPair)> {
    let code = code.trim();
    if code.is_empty() {
        return Err(OAuthError::Exchange("empty authorization code".into()).into());
    }

    let access_token = state.github.exchange_code(code).await?;
    let profile = state.github.fetch_user(&access_token).await?;
    let emails = state.github.fetch_emails(&access_token).await?;
    let primary = primary_email(&emails)?;
    let email = normalize_email(&primary.email);
    let github_id = profile.id.to_string();

    let sid = Uuid::new_v4();
    let link = GithubLink {
        github_id: github_id.clone(),
        avatar_url: profile.avatar_url.clone(),
    };

    let user = if let Some(existing) = state.users.find_by_github_id(&github_id).await? {
        state.users.link_github(existing.id, link, sid).await?
    } else if let Some(existing) = state.users.find_by_email(&email).await? {
        if !primary.verified {
            warn!(user_id = %existing.id, email = %email, "refusing to link unverified GitHub email");
            return Err(OAuthError::UnverifiedEmail(email).into());
        }
        info!(user_id = %existing.id, github_id = %github_id, "linking GitHub identity to existing account");
        state.users.link_github(existing.id, link, sid).await?
    } else {
        let name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&profile.login)
            .to_string();
        let created = state
            .users
            .create(NewUser {
                name,
                email,
                password_hash: None,
                role: Role::User,
                provider: Provider::Github,
                github_id: Some(github_id),
                avatar_url: profile.avatar_url,
                session_id: Some(sid),
            })
            .await?;
        info!(user_id = %created.id, "user created from GitHub login");
        created
    };

    let tokens = sign_pair(&JwtKeys::from_ref(state), user.id, sid)?;
    Ok((user, tokens))
}
