use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    cancel_generation_handler, chat_messages_handler, create_chat_handler,
    edit_message_handler, get_chat_handler, health_handler, list_chats_handler,
    run_status_handler, send_message_handler,
};
use crate::presentation::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/v1/chats",
            post(create_chat_handler).get(list_chats_handler),
        )
        .route("/api/v1/chats/{chat_id}", get(get_chat_handler))
        .route(
            "/api/v1/chats/{chat_id}/messages",
            get(chat_messages_handler).post(send_message_handler),
        )
        .route(
            "/api/v1/chats/{chat_id}/cancel",
            post(cancel_generation_handler),
        )
        .route(
            "/api/v1/messages/{message_id}",
            axum::routing::patch(edit_message_handler),
        )
        .route("/api/v1/runs/{run_id}", get(run_status_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
