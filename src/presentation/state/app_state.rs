use std::sync::Arc;

use crate::application::services::ChatService;
use crate::presentation::config::{ScaffoldConfig, Settings};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub settings: Settings,
    pub scaffold_config: ScaffoldConfig,
}
