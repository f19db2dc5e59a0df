use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use parley::application::ports::{ConversationStore, GenerationClient};
use parley::application::services::ChatService;
use parley::infrastructure::llm::{ScriptedGenerationClient, create_generation_client};
use parley::infrastructure::observability::{TracingConfig, init_tracing};
use parley::infrastructure::persistence::{
    InMemoryConversationStore, PgConversationStore, create_pool, run_migrations,
};
use parley::presentation::{AppState, Environment, ScaffoldConfig, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment)?;

    init_tracing(&TracingConfig::from_settings(
        environment.as_str(),
        &settings.logging,
    ));

    let scaffold_config = ScaffoldConfig::default();

    let store: Arc<dyn ConversationStore> = match &settings.database.url {
        Some(_) if !scaffold_config.enabled => {
            let pool = create_pool(&settings.database).await?;
            if settings.database.run_migrations {
                run_migrations(&pool).await?;
            }
            Arc::new(PgConversationStore::new(pool))
        }
        _ => {
            tracing::warn!("No database configured, using in-memory conversation store");
            Arc::new(InMemoryConversationStore::new())
        }
    };

    let generation_client: Arc<dyn GenerationClient> = if scaffold_config.enabled {
        tracing::info!(
            delay_ms = scaffold_config.mock_response_delay_ms,
            "Scaffold mode enabled, replies are scripted"
        );
        Arc::new(ScriptedGenerationClient::from_reply(
            &scaffold_config.mock_reply,
            scaffold_config.fragment_delay(),
        ))
    } else {
        Arc::new(create_generation_client(&settings.llm)?)
    };

    let chat_service = Arc::new(ChatService::with_generation(
        store,
        generation_client,
        settings.generation.run_history_capacity,
    ));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;

    let state = AppState {
        chat_service,
        settings,
        scaffold_config,
    };

    let router = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
