use std::str::FromStr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::ChatServiceError;
use crate::domain::{
    Chat, ChatId, GenerationRun, Message, MessageId, MessageRole, MessageStatus, RunId,
    RunStatus, UserId,
};

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub id: ChatId,
    pub user_id: Option<UserId>,
    pub title: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            user_id: chat.user_id,
            title: chat.title,
            is_guest: chat.is_guest,
            created_at: chat.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: MessageRole,
    pub content: String,
    pub edited: bool,
    pub original_content: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            role: message.role,
            content: message.content,
            edited: message.edited,
            original_content: message.original_content,
            status: message.status,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

/// Run snapshot; `epoch` is the chat generation the run was allowed to write in.
#[derive(Serialize)]
pub struct RunResponse {
    pub id: RunId,
    pub chat_id: ChatId,
    pub trigger_message_id: MessageId,
    pub epoch: u64,
    pub status: RunStatus,
    pub assistant_message_id: Option<MessageId>,
    pub fragments_committed: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationRun> for RunResponse {
    fn from(run: GenerationRun) -> Self {
        Self {
            id: run.id,
            chat_id: run.chat_id,
            trigger_message_id: run.trigger_message_id,
            epoch: run.epoch,
            status: run.status,
            assistant_message_id: run.assistant_message_id,
            fragments_committed: run.fragments_committed,
            error_message: run.error_message,
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

pub fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Parses a path segment into a typed id, answering 400 when it is not a UUID.
pub fn parse_id<T: FromStr>(raw: &str, kind: &str) -> Result<T, Response> {
    raw.parse::<T>().map_err(|_| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid {} ID: {}", kind, raw))
    })
}

pub fn service_error_response(e: ChatServiceError) -> Response {
    match e {
        ChatServiceError::NotFound(what) => {
            error_response(StatusCode::NOT_FOUND, format!("Not found: {}", what))
        }
        ChatServiceError::InvalidInput(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        ChatServiceError::Repository(e) => {
            tracing::error!(error = %e, "Store operation failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage error: {}", e),
            )
        }
    }
}
