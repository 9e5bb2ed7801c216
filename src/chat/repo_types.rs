use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Routing of a message, fixed when it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Admin message to every user.
    Broadcast,
    /// Admin message to one user.
    Direct { recipient_id: Uuid },
    /// User message to the admins.
    Peer,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Broadcast => "broadcast",
            MessageKind::Direct { .. } => "direct",
            MessageKind::Peer => "peer",
        }
    }

    pub fn recipient_id(&self) -> Option<Uuid> {
        match self {
            MessageKind::Direct { recipient_id } => Some(*recipient_id),
            _ => None,
        }
    }

    fn from_parts(kind: &str, recipient_id: Option<Uuid>) -> anyhow::Result<Self> {
        match (kind, recipient_id) {
            ("broadcast", None) => Ok(MessageKind::Broadcast),
            ("direct", Some(recipient_id)) => Ok(MessageKind::Direct { recipient_id }),
            ("peer", None) => Ok(MessageKind::Peer),
            (other, rid) => anyhow::bail!("inconsistent message kind {other:?} (recipient {rid:?})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub key: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
}

/// Copy of the message being replied to, taken at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySnapshot {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub is_admin: bool,
    pub kind: MessageKind,
    pub reply_to: Option<ReplySnapshot>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ChatRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub file_key: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub is_admin: bool,
    pub kind: String,
    pub recipient_id: Option<Uuid>,
    pub reply_to: Option<Json<ReplySnapshot>>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<ChatRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(r: ChatRow) -> Result<Self, Self::Error> {
        let attachment = match (r.file_key, r.file_name) {
            (Some(key), Some(name)) => Some(Attachment {
                key,
                name,
                content_type: r
                    .file_type
                    .unwrap_or_else(|| "application/octet-stream".into()),
                size: r.file_size.unwrap_or_default(),
            }),
            _ => None,
        };
        Ok(Self {
            id: r.id,
            sender_id: r.sender_id,
            sender_name: r.sender_name,
            content: r.content,
            attachment,
            is_admin: r.is_admin,
            kind: MessageKind::from_parts(&r.kind, r.recipient_id)?,
            reply_to: r.reply_to.map(|Json(snapshot)| snapshot),
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub attachment: Option<Attachment>,
    pub is_admin: bool,
    pub kind: MessageKind,
    pub reply_to: Option<ReplySnapshot>,
}
