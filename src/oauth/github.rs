use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::GithubConfig;

const OAUTH_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "fiftytwo";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("GitHub OAuth is not configured")]
    NotConfigured,

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),

    #[error("No primary email found for GitHub user")]
    NoPrimaryEmail,

    #[error("primary email {0} is not verified and already belongs to an account")]
    UnverifiedEmail(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Trade an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError>;
    async fn fetch_user(&self, access_token: &str) -> Result<GithubProfile, OAuthError>;
    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GithubEmail>, OAuthError>;
}

#[derive(Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct GithubClient {
    http: reqwest::Client,
    config: Option<GithubConfig>,
}

impl GithubClient {
    pub fn new(config: Option<GithubConfig>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, config })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(access_token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| OAuthError::Profile(format!("GET {path}: {e}")))?;

        if !response.status().is_success() {
            return Err(OAuthError::Profile(format!(
                "GET {path}: GitHub API error {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Profile(format!("GET {path}: {e}")))
    }
}

#[async_trait]
impl GithubApi for GithubClient {
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let cfg = self.config.as_ref().ok_or(OAuthError::NotConfigured)?;

        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", cfg.client_id.as_str()),
                ("client_secret", cfg.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", cfg.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;

        let token: GitHubTokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Exchange(format!("Failed to parse token response: {e}")))?;

        match token.access_token {
            Some(t) if !t.is_empty() => {
                debug!("github code exchanged");
                Ok(t)
            }
            _ => Err(OAuthError::Exchange(
                token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "no access_token in response".into()),
            )),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GithubProfile, OAuthError> {
        self.get_json("/user", access_token).await
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GithubEmail>, OAuthError> {
        self.get_json("/user/emails", access_token).await
    }
}

/// The address GitHub marks as primary.
pub fn primary_email(emails: &[GithubEmail]) -> Result<&GithubEmail, OAuthError> {
    emails
        .iter()
        .find(|e| e.primary)
        .ok_or(OAuthError::NoPrimaryEmail)
}
