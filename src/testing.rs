//! In-memory stand-ins for the database, object store and GitHub, used by unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        dto::TokenPair,
        password::hash_password,
        repo::UserRepo,
        repo_types::{GithubLink, NewUser, Provider, Role, User},
        services::open_session,
    },
    chat::{
        repo::ChatRepo,
        repo_types::{ChatMessage, NewMessage},
    },
    error::AppError,
    oauth::github::{GithubApi, GithubEmail, GithubProfile, OAuthError},
    projects::{
        repo::ProjectRepo,
        repo_types::{NewProject, Project, ProjectChanges, ProjectStatus},
    },
    state::AppState,
    storage::{StorageClient, UPLOADS_PREFIX},
};

fn conflict(msg: &str) -> anyhow::Error {
    anyhow::Error::new(AppError::Conflict(msg.into()))
}

#[derive(Default)]
pub struct MemoryUsers {
    rows: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_github_id(&self, github_id: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.github_id.as_deref() == Some(github_id))
            .cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == new.email) {
            return Err(conflict("Email already registered"));
        }
        if new.github_id.is_some() && rows.iter().any(|u| u.github_id == new.github_id) {
            return Err(conflict("GitHub account already linked"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            provider: new.provider,
            github_id: new.github_id,
            avatar_url: new.avatar_url,
            session_id: new.session_id,
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn set_session(&self, id: Uuid, session_id: Option<Uuid>) -> anyhow::Result<()> {
        if let Some(user) = self.rows.lock().unwrap().iter_mut().find(|u| u.id == id) {
            user.session_id = session_id;
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn link_github(&self, id: Uuid, link: GithubLink, session_id: Uuid) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|u| u.id != id && u.github_id.as_deref() == Some(link.github_id.as_str()))
        {
            return Err(conflict("GitHub account already linked"));
        }
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow::anyhow!("no user {id}"))?;
        user.github_id = Some(link.github_id);
        if link.avatar_url.is_some() {
            user.avatar_url = link.avatar_url;
        }
        user.provider = Provider::Github;
        user.session_id = Some(session_id);
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn rename(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.iter_mut().find(|u| u.id == id).map(|u| {
            u.name = name.to_string();
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }
}

const WEEK_TAKEN: &str = "You already have a project for this week";

#[derive(Default)]
pub struct MemoryProjects {
    rows: Mutex<Vec<Project>>,
}

fn by_week(mut projects: Vec<Project>) -> Vec<Project> {
    projects.sort_by(|a, b| a.week.cmp(&b.week).then(a.created_at.cmp(&b.created_at)));
    projects
}

#[async_trait]
impl ProjectRepo for MemoryProjects {
    async fn create(&self, new: NewProject) -> anyhow::Result<Project> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|p| p.user_id == new.user_id && p.week == new.week) {
            return Err(conflict(WEEK_TAKEN));
        }
        let now = OffsetDateTime::now_utc();
        let project = Project {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            tech_stack: new.tech_stack,
            week: new.week,
            status: new.status,
            github_repo: new.github_repo,
            url: new.url,
            user_id: new.user_id,
            user_name: new.user_name,
            hidden: false,
            created_at: now,
            updated_at: now,
        };
        rows.push(project.clone());
        Ok(project)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Project>> {
        let rows = self.rows.lock().unwrap();
        Ok(by_week(rows.iter().filter(|p| p.user_id == user_id).cloned().collect()))
    }

    async fn list_unhidden(&self) -> anyhow::Result<Vec<Project>> {
        let rows = self.rows.lock().unwrap();
        Ok(by_week(rows.iter().filter(|p| !p.hidden).cloned().collect()))
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Project>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|p| p.id == id && p.user_id == user_id).cloned())
    }

    async fn find_by_week(&self, user_id: Uuid, week: i32) -> anyhow::Result<Option<Project>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|p| p.user_id == user_id && p.week == week).cloned())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: ProjectChanges,
    ) -> anyhow::Result<Option<Project>> {
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|p| p.id != id && p.user_id == user_id && p.week == changes.week)
        {
            return Err(conflict(WEEK_TAKEN));
        }
        Ok(rows
            .iter_mut()
            .find(|p| p.id == id && p.user_id == user_id)
            .map(|p| {
                p.title = changes.title;
                p.description = changes.description;
                p.tech_stack = changes.tech_stack;
                p.week = changes.week;
                p.github_repo = changes.github_repo;
                p.url = changes.url;
                p.updated_at = OffsetDateTime::now_utc();
                p.clone()
            }))
    }

    async fn set_status(&self, id: Uuid, status: ProjectStatus) -> anyhow::Result<Option<Project>> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.iter_mut().find(|p| p.id == id).map(|p| {
            p.status = status;
            p.updated_at = OffsetDateTime::now_utc();
            p.clone()
        }))
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|p| !(p.id == id && p.user_id == user_id));
        Ok(rows.len() < before)
    }

    async fn hide(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .iter_mut()
            .find(|p| p.id == id)
            .map(|p| p.hidden = true)
            .is_some())
    }
}

/// Messages kept in send order.
#[derive(Default)]
pub struct MemoryChat {
    rows: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl ChatRepo for MemoryChat {
    async fn insert(&self, new: NewMessage) -> anyhow::Result<ChatMessage> {
        let msg = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            sender_name: new.sender_name,
            content: new.content,
            attachment: new.attachment,
            is_admin: new.is_admin,
            kind: new.kind,
            reply_to: new.reply_to,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(msg.clone());
        Ok(msg)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn list_visible_to(&self, user_id: Uuid) -> anyhow::Result<Vec<ChatMessage>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| {
                m.sender_id == user_id
                    || (m.is_admin
                        && m.kind.recipient_id().map_or(true, |r| r == user_id))
            })
            .cloned()
            .collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ChatMessage>> {
        Ok(self.rows.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.id != id);
        Ok(rows.len() < before)
    }
}

/// Object store that keeps uploads in memory. Clones share contents.
#[derive(Clone, Default)]
pub struct FakeStorage {
    objects: Arc<Mutex<BTreeMap<String, Bytes>>>,
}

impl FakeStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn url_for(&self, key: &str) -> anyhow::Result<String> {
        Ok(format!("{UPLOADS_PREFIX}/{key}"))
    }
}

enum GithubBehaviour {
    NotConfigured,
    FailExchange,
    Respond {
        profile: GithubProfile,
        emails: Vec<GithubEmail>,
    },
}

/// Scripted GitHub. The default behaves like a server without OAuth credentials.
pub struct FakeGithub {
    behaviour: GithubBehaviour,
}

impl Default for FakeGithub {
    fn default() -> Self {
        Self {
            behaviour: GithubBehaviour::NotConfigured,
        }
    }
}

impl FakeGithub {
    pub fn new(profile: GithubProfile, emails: Vec<GithubEmail>) -> Self {
        Self {
            behaviour: GithubBehaviour::Respond { profile, emails },
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: GithubBehaviour::FailExchange,
        }
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        match &self.behaviour {
            GithubBehaviour::NotConfigured => Err(OAuthError::NotConfigured),
            GithubBehaviour::FailExchange => Err(OAuthError::Exchange("bad_verification_code".into())),
            GithubBehaviour::Respond { .. } => Ok(format!("gho_{code}")),
        }
    }

    async fn fetch_user(&self, _access_token: &str) -> Result<GithubProfile, OAuthError> {
        match &self.behaviour {
            GithubBehaviour::Respond { profile, .. } => Ok(profile.clone()),
            _ => Err(OAuthError::Profile("no profile".into())),
        }
    }

    async fn fetch_emails(&self, _access_token: &str) -> Result<Vec<GithubEmail>, OAuthError> {
        match &self.behaviour {
            GithubBehaviour::Respond { emails, .. } => Ok(emails.clone()),
            _ => Err(OAuthError::Profile("no emails".into())),
        }
    }
}

pub trait StateExt {
    fn with_github(self, github: FakeGithub) -> AppState;
    fn with_storage(self, storage: FakeStorage) -> AppState;
    fn with_chat(self, chat: impl ChatRepo + 'static) -> AppState;
}

impl StateExt for AppState {
    fn with_github(mut self, github: FakeGithub) -> AppState {
        self.github = Arc::new(github);
        self
    }

    fn with_storage(mut self, storage: FakeStorage) -> AppState {
        self.storage = Arc::new(storage);
        self
    }

    fn with_chat(mut self, chat: impl ChatRepo + 'static) -> AppState {
        self.chat = Arc::new(chat);
        self
    }
}

/// Create a local account with password `password1` and open a session for it.
pub async fn register_user(state: &AppState, name: &str, email: &str, role: Role) -> (User, TokenPair) {
    let user = state
        .users
        .create(NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: Some(hash_password("password1").unwrap()),
            role,
            provider: Provider::Local,
            github_id: None,
            avatar_url: None,
            session_id: None,
        })
        .await
        .unwrap();
    let tokens = open_session(state, &user).await.unwrap();
    let user = state.users.find_by_id(user.id).await.unwrap().unwrap();
    (user, tokens)
}
