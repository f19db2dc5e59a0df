use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, MessageId, RunId};
use crate::presentation::state::AppState;

use super::responses::{parse_id, service_error_response};

#[derive(Deserialize)]
pub struct MessageContentRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub message_id: MessageId,
    pub run_id: RunId,
}

#[derive(Serialize)]
pub struct EditMessageResponse {
    pub message_id: MessageId,
    pub edited: bool,
    pub original_content: Option<String>,
    /// Present only when the edit triggered a new reply.
    pub run_id: Option<RunId>,
}

/// Stores the user message and returns as soon as generation is scheduled.
#[tracing::instrument(skip(state, request))]
pub async fn send_message_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<MessageContentRequest>,
) -> impl IntoResponse {
    let id: ChatId = match parse_id(&chat_id, "chat") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .chat_service
        .send_message(id, &request.content)
        .await
    {
        Ok(outcome) => (
            StatusCode::ACCEPTED,
            Json(SendMessageResponse {
                message_id: outcome.message.id,
                run_id: outcome.run_id,
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state, request))]
pub async fn edit_message_handler(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(request): Json<MessageContentRequest>,
) -> impl IntoResponse {
    let id: MessageId = match parse_id(&message_id, "message") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .chat_service
        .edit_message(id, &request.content)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(EditMessageResponse {
                message_id: outcome.message.id,
                edited: outcome.message.edited,
                original_content: outcome.message.original_content,
                run_id: outcome.run_id,
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}
