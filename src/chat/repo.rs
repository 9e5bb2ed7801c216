use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::chat::repo_types::{ChatMessage, ChatRow, NewMessage};

#[async_trait]
pub trait ChatRepo: Send + Sync {
    async fn insert(&self, new: NewMessage) -> anyhow::Result<ChatMessage>;
    async fn list_all(&self) -> anyhow::Result<Vec<ChatMessage>>;
    /// Messages a regular user may read: their own, plus admin messages
    /// that are broadcast or addressed to them.
    async fn list_visible_to(&self, user_id: Uuid) -> anyhow::Result<Vec<ChatMessage>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ChatMessage>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const CHAT_COLUMNS: &str = "id, sender_id, sender_name, content, file_key, file_name, file_type, \
                            file_size, is_admin, kind, recipient_id, reply_to, created_at";

pub struct PgChatRepo {
    db: PgPool,
}

impl PgChatRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn convert(rows: Vec<ChatRow>) -> anyhow::Result<Vec<ChatMessage>> {
    rows.into_iter().map(ChatMessage::try_from).collect()
}

#[async_trait]
impl ChatRepo for PgChatRepo {
    async fn insert(&self, new: NewMessage) -> anyhow::Result<ChatMessage> {
        let sql = format!(
            r#"
            INSERT INTO chat_messages
                (sender_id, sender_name, content, file_key, file_name, file_type, file_size,
                 is_admin, kind, recipient_id, reply_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {CHAT_COLUMNS}
            "#
        );
        let file = new.attachment.as_ref();
        let row = sqlx::query_as::<_, ChatRow>(&sql)
            .bind(new.sender_id)
            .bind(&new.sender_name)
            .bind(&new.content)
            .bind(file.map(|a| a.key.as_str()))
            .bind(file.map(|a| a.name.as_str()))
            .bind(file.map(|a| a.content_type.as_str()))
            .bind(file.map(|a| a.size))
            .bind(new.is_admin)
            .bind(new.kind.as_str())
            .bind(new.kind.recipient_id())
            .bind(new.reply_to.map(Json))
            .fetch_one(&self.db)
            .await?;
        ChatMessage::try_from(row)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<ChatMessage>> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chat_messages ORDER BY created_at ASC, id ASC");
        let rows = sqlx::query_as::<_, ChatRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        convert(rows)
    }

    async fn list_visible_to(&self, user_id: Uuid) -> anyhow::Result<Vec<ChatMessage>> {
        let sql = format!(
            r#"
            SELECT {CHAT_COLUMNS}
              FROM chat_messages
             WHERE sender_id = $1
                OR (is_admin AND (recipient_id IS NULL OR recipient_id = $1))
             ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query_as::<_, ChatRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        convert(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<ChatMessage>> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chat_messages WHERE id = $1");
        let row = sqlx::query_as::<_, ChatRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(ChatMessage::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
