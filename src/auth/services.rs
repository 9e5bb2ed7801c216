use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, TokenPair},
        jwt::JwtKeys,
        password::{check_strength, hash_password, verify_password},
        repo_types::{NewUser, Provider, Role, User},
    },
    config::AdminSeed,
    error::{AppError, AppResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

pub fn sign_pair(keys: &JwtKeys, user_id: Uuid, sid: Uuid) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        access_token: keys.sign_access(user_id, sid)?,
        refresh_token: keys.sign_refresh(user_id, sid)?,
    })
}

/// Start a fresh session for `user`, replacing whatever session it had.
pub async fn open_session(state: &AppState, user: &User) -> AppResult<TokenPair> {
    let sid = Uuid::new_v4();
    state.users.set_session(user.id, Some(sid)).await?;
    Ok(sign_pair(&JwtKeys::from_ref(state), user.id, sid)?)
}

pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    let name = req.name.trim().to_string();

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    check_strength(&req.password).map_err(AppError::Validation)?;
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash: Some(hash_password(&req.password)?),
            role: Role::User,
            provider: Provider::Local,
            github_id: None,
            avatar_url: None,
            session_id: None,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<(User, TokenPair)> {
    let email = normalize_email(&req.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid_credentials());
    };
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login on account without password");
        return Err(invalid_credentials());
    };
    if !verify_password(&req.password, hash) {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let tokens = open_session(state, &user).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((user, tokens))
}

/// Resolve a bearer access token to the user owning the current session.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<User> {
    let claims = JwtKeys::from_ref(state).verify_access(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token".into()))?;

    if user.session_id != Some(claims.sid) {
        warn!(user_id = %user.id, "token from a replaced session");
        return Err(AppError::Unauthorized("Session is no longer valid".into()));
    }
    Ok(user)
}

pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<(User, TokenPair)> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    if user.session_id != Some(claims.sid) {
        return Err(AppError::Unauthorized("Session is no longer valid".into()));
    }

    let tokens = sign_pair(&keys, user.id, claims.sid)?;
    Ok((user, tokens))
}

pub async fn logout(state: &AppState, user: &User) -> AppResult<()> {
    state.users.set_session(user.id, None).await?;
    info!(user_id = %user.id, "user logged out");
    Ok(())
}

pub async fn rename(state: &AppState, user: &User, name: &str) -> AppResult<User> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    state
        .users
        .rename(user.id, name)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Create the configured admin account unless the email is already taken.
pub async fn seed_admin(state: &AppState, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = state.users.find_by_email(&email).await? {
        if !existing.is_admin() {
            warn!(email = %email, "admin seed email belongs to a regular user; not promoting");
        } else {
            info!(email = %email, "admin user already exists");
        }
        return Ok(());
    }

    state
        .users
        .create(NewUser {
            name: seed.name.clone(),
            email: email.clone(),
            password_hash: Some(hash_password(&seed.password)?),
            role: Role::Admin,
            provider: Provider::Local,
            github_id: None,
            avatar_url: None,
            session_id: None,
        })
        .await?;
    info!(email = %email, "admin user created");
    Ok(())
}
