use std::str::FromStr;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    chat::{
        dto::{SendMessage, Upload},
        repo_types::{Attachment, ChatMessage, MessageKind, NewMessage, ReplySnapshot},
    },
    error::{AppError, AppResult},
    state::AppState,
    storage::attachment_key,
};

/// Read model over the viewer's visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    All,
    /// Admin messages addressed to the viewer.
    Inbox,
    /// Everything visible that is not in the inbox.
    Chat,
    Broadcast,
    /// Messages sent by a user plus direct messages to them.
    Conversation(Uuid),
}

impl View {
    pub fn parse(view: Option<&str>, with: Option<&str>) -> AppResult<Self> {
        match view.unwrap_or("all") {
            "all" => Ok(View::All),
            "inbox" => Ok(View::Inbox),
            "chat" => Ok(View::Chat),
            "broadcast" => Ok(View::Broadcast),
            "conversation" => {
                let with = with
                    .ok_or_else(|| AppError::Validation("conversation view needs `with`".into()))?;
                Ok(View::Conversation(parse_uuid(with, "Invalid user ID")?))
            }
            other => Err(AppError::Validation(format!("Unknown view {other:?}"))),
        }
    }

    fn admits(&self, msg: &ChatMessage, viewer: &User) -> bool {
        match self {
            View::All => true,
            View::Inbox => is_inbox(msg, viewer),
            View::Chat => !is_inbox(msg, viewer),
            View::Broadcast => msg.kind == MessageKind::Broadcast,
            View::Conversation(user_id) => {
                msg.sender_id == *user_id || msg.kind.recipient_id() == Some(*user_id)
            }
        }
    }
}

fn parse_uuid(raw: &str, msg: &str) -> AppResult<Uuid> {
    Uuid::from_str(raw.trim()).map_err(|_| AppError::BadRequest(msg.into()))
}

/// Whether `viewer` may read `msg`.
pub fn is_visible(msg: &ChatMessage, viewer: &User) -> bool {
    if viewer.is_admin() || msg.sender_id == viewer.id {
        return true;
    }
    msg.is_admin
        && match msg.kind {
            MessageKind::Broadcast => true,
            MessageKind::Direct { recipient_id } => recipient_id == viewer.id,
            MessageKind::Peer => false,
        }
}

pub fn is_inbox(msg: &ChatMessage, viewer: &User) -> bool {
    msg.is_admin && msg.kind.recipient_id() == Some(viewer.id)
}

async fn message_kind(state: &AppState, sender: &User, req: &SendMessage) -> AppResult<MessageKind> {
    let recipient = req
        .recipient_id
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    if !sender.is_admin() {
        if recipient.is_some() || req.is_broadcast {
            return Err(AppError::Validation(
                "Only admins can send direct or broadcast messages".into(),
            ));
        }
        return Ok(MessageKind::Peer);
    }

    let Some(raw) = recipient else {
        return Ok(MessageKind::Broadcast);
    };
    if req.is_broadcast {
        return Err(AppError::Validation("A broadcast cannot have a recipient".into()));
    }
    let recipient_id = Uuid::from_str(raw)
        .map_err(|_| AppError::Validation("Invalid recipient ID".into()))?;
    if state.users.find_by_id(recipient_id).await?.is_none() {
        return Err(AppError::Validation("Recipient not found".into()));
    }
    Ok(MessageKind::Direct { recipient_id })
}

async fn reply_snapshot(
    state: &AppState,
    sender: &User,
    reply_to_id: Option<&str>,
) -> AppResult<Option<ReplySnapshot>> {
    let Some(raw) = reply_to_id.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let id = parse_uuid(raw, "Invalid message ID")?;
    let original = state
        .chat
        .find(id)
        .await?
        .filter(|m| is_visible(m, sender))
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;
    Ok(Some(ReplySnapshot {
        message_id: original.id,
        sender_id: original.sender_id,
        sender_name: original.sender_name,
        content: original.content,
    }))
}

async fn store_upload(state: &AppState, sender: &User, upload: Upload) -> AppResult<Attachment> {
    let max = state.config.max_upload_bytes;
    let size = upload.body.len();
    if size > max {
        warn!(user_id = %sender.id, size, max, "attachment over limit");
        return Err(AppError::PayloadTooLarge { size, max });
    }

    let name = match upload.file_name.trim() {
        "" => "file".to_string(),
        n => n.to_string(),
    };
    let key = attachment_key(&name);
    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await?;
    Ok(Attachment {
        key,
        name,
        content_type: upload.content_type,
        size: size as i64,
    })
}

pub async fn send_message(state: &AppState, sender: &User, req: SendMessage) -> AppResult<ChatMessage> {
    let content = req.content.trim().to_string();
    if content.is_empty() && req.file.is_none() {
        return Err(AppError::Validation("Message content is required".into()));
    }

    let kind = message_kind(state, sender, &req).await?;
    let reply_to = reply_snapshot(state, sender, req.reply_to_id.as_deref()).await?;
    let attachment = match req.file {
        Some(upload) => Some(store_upload(state, sender, upload).await?),
        None => None,
    };
    let stored_key = attachment.as_ref().map(|a| a.key.clone());

    let new = NewMessage {
        sender_id: sender.id,
        sender_name: sender.display_name(),
        content,
        attachment,
        is_admin: sender.is_admin(),
        kind,
        reply_to,
    };
    let msg = match state.chat.insert(new).await {
        Ok(msg) => msg,
        Err(e) => {
            if let Some(key) = stored_key {
                if let Err(cleanup) = state.storage.delete_object(&key).await {
                    warn!(key = %key, error = %cleanup, "orphaned attachment");
                }
            }
            return Err(e.into());
        }
    };

    info!(message_id = %msg.id, sender_id = %sender.id, kind = msg.kind.as_str(), "message sent");
    Ok(msg)
}

/// Messages `viewer` can see, oldest first, narrowed to `view`.
pub async fn list_for(state: &AppState, viewer: &User, view: View) -> AppResult<Vec<ChatMessage>> {
    let visible = if viewer.is_admin() {
        state.chat.list_all().await?
    } else {
        state.chat.list_visible_to(viewer.id).await?
    };
    Ok(visible
        .into_iter()
        .filter(|m| is_visible(m, viewer) && view.admits(m, viewer))
        .collect())
}

pub async fn delete_message(state: &AppState, requester: &User, raw_id: &str) -> AppResult<()> {
    let id = parse_uuid(raw_id, "Invalid message ID")?;
    let msg = state
        .chat
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

    if !requester.is_admin() && msg.sender_id != requester.id {
        warn!(message_id = %id, user_id = %requester.id, "delete of foreign message denied");
        return Err(AppError::Forbidden("Not authorized to delete this message".into()));
    }

    if !state.chat.delete(id).await? {
        return Err(AppError::NotFound("Message not found".into()));
    }
    if let Some(attachment) = msg.attachment {
        if let Err(e) = state.storage.delete_object(&attachment.key).await {
            warn!(key = %attachment.key, error = %e, "failed to delete attachment");
        }
    }
    info!(message_id = %id, user_id = %requester.id, "message deleted");
    Ok(())
}
