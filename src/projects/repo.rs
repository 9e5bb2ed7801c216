use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::map_unique_violation;
use crate::projects::repo_types::{NewProject, Project, ProjectChanges, ProjectRow, ProjectStatus};

const WEEK_TAKEN: &str = "You already have a project for this week";

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create(&self, new: NewProject) -> anyhow::Result<Project>;
    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Project>>;
    /// Every project not hidden by an admin.
    async fn list_unhidden(&self) -> anyhow::Result<Vec<Project>>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Project>>;
    async fn find_by_week(&self, user_id: Uuid, week: i32) -> anyhow::Result<Option<Project>>;
    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: ProjectChanges,
    ) -> anyhow::Result<Option<Project>>;
    async fn set_status(&self, id: Uuid, status: ProjectStatus) -> anyhow::Result<Option<Project>>;
    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
    async fn hide(&self, id: Uuid) -> anyhow::Result<bool>;
}

const PROJECT_COLUMNS: &str = "id, title, description, tech_stack, week, status, github_repo, url, \
                               user_id, user_name, hidden, created_at, updated_at";

pub struct PgProjectRepo {
    db: PgPool,
}

impl PgProjectRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn convert(rows: Vec<ProjectRow>) -> anyhow::Result<Vec<Project>> {
    rows.into_iter().map(Project::try_from).collect()
}

#[async_trait]
impl ProjectRepo for PgProjectRepo {
    async fn create(&self, new: NewProject) -> anyhow::Result<Project> {
        let sql = format!(
            r#"
            INSERT INTO projects (user_id, user_name, title, description, tech_stack, week, status, github_repo, url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(new.user_id)
            .bind(&new.user_name)
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.tech_stack)
            .bind(new.week)
            .bind(new.status.as_str())
            .bind(&new.github_repo)
            .bind(&new.url)
            .fetch_one(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, WEEK_TAKEN))?;
        Project::try_from(row)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY week ASC, created_at ASC"
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        convert(rows)
    }

    async fn list_unhidden(&self) -> anyhow::Result<Vec<Project>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE NOT hidden ORDER BY week ASC, created_at ASC"
        );
        let rows = sqlx::query_as::<_, ProjectRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        convert(rows)
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Project::try_from).transpose()
    }

    async fn find_by_week(&self, user_id: Uuid, week: i32) -> anyhow::Result<Option<Project>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 AND week = $2");
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(user_id)
            .bind(week)
            .fetch_optional(&self.db)
            .await?;
        row.map(Project::try_from).transpose()
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: ProjectChanges,
    ) -> anyhow::Result<Option<Project>> {
        let sql = format!(
            r#"
            UPDATE projects
               SET title = $3, description = $4, tech_stack = $5, week = $6,
                   github_repo = $7, url = $8, updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(&changes.tech_stack)
            .bind(changes.week)
            .bind(&changes.github_repo)
            .bind(&changes.url)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, WEEK_TAKEN))?;
        row.map(Project::try_from).transpose()
    }

    async fn set_status(&self, id: Uuid, status: ProjectStatus) -> anyhow::Result<Option<Project>> {
        let sql = format!(
            "UPDATE projects SET status = $2, updated_at = now() WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProjectRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.db)
            .await?;
        row.map(Project::try_from).transpose()
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn hide(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE projects SET hidden = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
