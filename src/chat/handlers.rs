use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    chat::{
        dto::{ListQuery, MessageList, MessageView, SendMessage, Upload},
        services::{self, View},
    },
    error::{AppError, AppResult, Json},
    projects::dto::MessageResponse,
    state::AppState,
};

/// Room for the text fields and multipart framing around a maximal file.
const FORM_OVERHEAD: usize = 64 * 1024;

fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_add(FORM_OVERHEAD)
}

pub fn chat_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/chat", get(list_messages).post(send_message))
        .route("/chat/:id", delete(delete_message))
        .layer(DefaultBodyLimit::max(body_limit(max_upload_bytes)))
}

fn form_error(e: MultipartError, max: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge {
            size: body_limit(max),
            max,
        };
    }
    AppError::BadRequest(format!("Multipart error: {}", e.body_text()))
}

fn truthy(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "on")
}

async fn read_form(mut mp: Multipart, max: usize) -> AppResult<SendMessage> {
    let mut req = SendMessage::default();
    while let Some(field) = mp.next_field().await.map_err(|e| form_error(e, max))? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field.bytes().await.map_err(|e| form_error(e, max))?;
                // browsers send an empty part when no file was picked
                if !body.is_empty() || !file_name.is_empty() {
                    req.file = Some(Upload {
                        file_name,
                        content_type,
                        body,
                    });
                }
            }
            "content" | "recipientId" | "isBroadcast" | "replyToId" => {
                let value = field.text().await.map_err(|e| form_error(e, max))?;
                match name.as_str() {
                    "content" => req.content = value,
                    "recipientId" => req.recipient_id = Some(value),
                    "isBroadcast" => req.is_broadcast = truthy(&value),
                    _ => req.reply_to_id = Some(value),
                }
            }
            _ => {}
        }
    }
    Ok(req)
}

#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<MessageView>)> {
    let req = read_form(mp, state.config.max_upload_bytes).await?;
    let msg = services::send_message(&state, &user, req).await?;
    let view = MessageView::render(state.storage.as_ref(), msg).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<MessageList>> {
    let view = View::parse(q.view.as_deref(), q.with.as_deref())?;
    let msgs = services::list_for(&state, &user, view).await?;

    let mut messages = Vec::with_capacity(msgs.len());
    for msg in msgs {
        messages.push(MessageView::render(state.storage.as_ref(), msg).await?);
    }
    Ok(Json(MessageList { messages }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_message(&state, &user, &id).await?;
    Ok(Json(MessageResponse {
        message: "Message deleted successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_flag_parsing() {
        assert!(truthy("true"));
        assert!(truthy(" 1 "));
        assert!(!truthy("false"));
        assert!(!truthy(""));
    }

    #[test]
    fn body_limit_saturates() {
        assert_eq!(body_limit(10), 10 + FORM_OVERHEAD);
        assert_eq!(body_limit(usize::MAX), usize::MAX);
        let _ = chat_routes(usize::MAX);
    }
}
