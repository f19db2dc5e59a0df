use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::domain::RunId;
use crate::presentation::state::AppState;

use super::responses::{RunResponse, error_response, parse_id};

#[tracing::instrument(skip(state))]
pub async fn run_status_handler(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    let id: RunId = match parse_id(&run_id, "run") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.chat_service.get_run(id) {
        Some(run) => (StatusCode::OK, Json(RunResponse::from(run))).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Run not found: {}", run_id)),
    }
}
