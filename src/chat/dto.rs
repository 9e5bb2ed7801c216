use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::chat::repo_types::{ChatMessage, MessageKind, ReplySnapshot};
use crate::storage::StorageClient;

/// A send request after the multipart form has been read.
#[derive(Debug, Default)]
pub struct SendMessage {
    pub content: String,
    pub recipient_id: Option<String>,
    pub is_broadcast: bool,
    pub reply_to_id: Option<String>,
    pub file: Option<Upload>,
}

#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub view: Option<String>,
    pub with: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    pub is_admin: bool,
    pub is_broadcast: bool,
    pub recipient_id: Option<Uuid>,
    pub reply_to: Option<ReplySnapshot>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl MessageView {
    /// Attachment URLs are resolved per read; presigned ones expire.
    pub async fn render(storage: &dyn StorageClient, msg: ChatMessage) -> anyhow::Result<Self> {
        let (file_url, file_name, file_type, file_size) = match msg.attachment {
            Some(a) => (
                Some(storage.url_for(&a.key).await?),
                Some(a.name),
                Some(a.content_type),
                Some(a.size),
            ),
            None => (None, None, None, None),
        };
        Ok(Self {
            id: msg.id,
            sender_id: msg.sender_id,
            sender_name: msg.sender_name,
            content: msg.content,
            file_url,
            file_name,
            file_type,
            file_size,
            is_admin: msg.is_admin,
            is_broadcast: msg.kind == MessageKind::Broadcast,
            recipient_id: msg.kind.recipient_id(),
            reply_to: msg.reply_to,
            timestamp: msg.created_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub messages: Vec<MessageView>,
}
