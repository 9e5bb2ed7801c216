use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{GithubLink, NewUser, User, UserRow};
use crate::db::map_unique_violation_by;

/// Conflict message for a unique constraint on `users`.
fn user_conflict(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_github_id_key") => "GitHub account already linked",
        Some("users_session_id_key") => "Session already in use",
        _ => "Email already registered",
    }
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_github_id(&self, github_id: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Replace (or clear) the user's active session.
    async fn set_session(&self, id: Uuid, session_id: Option<Uuid>) -> anyhow::Result<()>;
    /// Attach a GitHub identity and open a session in one write.
    async fn link_github(&self, id: Uuid, link: GithubLink, session_id: Uuid)
        -> anyhow::Result<User>;
    async fn rename(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, provider, github_id, \
                            avatar_url, session_id, created_at, updated_at";

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.fetch_one_where("email = $1", email).await
    }

    async fn find_by_github_id(&self, github_id: &str) -> anyhow::Result<Option<User>> {
        self.fetch_one_where("github_id = $1", github_id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, provider, github_id, avatar_url, session_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .bind(new.provider.as_str())
            .bind(&new.github_id)
            .bind(&new.avatar_url)
            .bind(new.session_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_unique_violation_by(e, user_conflict))?;
        User::try_from(row)
    }

    async fn set_session(&self, id: Uuid, session_id: Option<Uuid>) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET session_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(session_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn link_github(
        &self,
        id: Uuid,
        link: GithubLink,
        session_id: Uuid,
    ) -> anyhow::Result<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET github_id = $2,
                   avatar_url = COALESCE($3, avatar_url),
                   provider = 'github',
                   session_id = $4,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&link.github_id)
            .bind(&link.avatar_url)
            .bind(session_id)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_unique_violation_by(e, user_conflict))?;
        User::try_from(row)
    }

    async fn rename(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET name = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose()
    }
}
