use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, RunId};
use crate::presentation::state::AppState;

use super::caller::CallerIdentity;
use super::responses::{
    ChatResponse, MessageResponse, error_response, parse_id, service_error_response,
};

#[derive(Deserialize)]
pub struct CreateChatRequest {
    pub title: String,
    #[serde(default)]
    pub is_guest: bool,
}

#[derive(Serialize)]
pub struct CreateChatResponse {
    pub id: ChatId,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled_run_id: RunId,
}

#[tracing::instrument(skip(state, request), fields(is_guest = request.is_guest))]
pub async fn create_chat_handler(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Json(request): Json<CreateChatRequest>,
) -> impl IntoResponse {
    match state
        .chat_service
        .create_chat(&request.title, request.is_guest, caller)
        .await
    {
        Ok(chat) => (
            StatusCode::CREATED,
            Json(CreateChatResponse {
                id: chat.id,
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn list_chats_handler(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
) -> impl IntoResponse {
    match state.chat_service.list_chats(caller).await {
        Ok(chats) => {
            let body: Vec<ChatResponse> = chats.into_iter().map(ChatResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn get_chat_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    let id: ChatId = match parse_id(&chat_id, "chat") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.chat_service.get_chat(id).await {
        Ok(Some(chat)) => (StatusCode::OK, Json(ChatResponse::from(chat))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Chat not found: {}", chat_id),
        ),
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn chat_messages_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    let id: ChatId = match parse_id(&chat_id, "chat") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .chat_service
        .get_chat_messages(id)
        .await
    {
        Ok(messages) => {
            let body: Vec<MessageResponse> =
                messages.into_iter().map(MessageResponse::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn cancel_generation_handler(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> impl IntoResponse {
    let id: ChatId = match parse_id(&chat_id, "chat") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .chat_service
        .cancel_generation(id)
    {
        Some(run_id) => (
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                cancelled_run_id: run_id,
            }),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("No generation in progress for chat {}", chat_id),
        ),
    }
}
