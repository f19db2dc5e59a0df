use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub scaffold_mode: bool,
    pub runs_in_flight: usize,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.settings.llm.chat_model.clone(),
        scaffold_mode: state.scaffold_config.enabled,
        runs_in_flight: state.chat_service.runs_in_flight(),
    })
}
