mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use parley::application::services::ChatService;
use parley::domain::RunId;
use parley::infrastructure::persistence::InMemoryConversationStore;
use parley::presentation::config::{
    DatabaseSettings, GenerationSettings, LlmProvider, LlmSettings, LoggingSettings,
    ServerSettings,
};
use parley::presentation::{AppState, ScaffoldConfig, Settings, create_router};

use helpers::{QueuedGenerationClient, Script};

const TEST_USER: &str = "7f9c2d3e-1a2b-4c5d-8e9f-0a1b2c3d4e5f";

struct TestApp {
    router: axum::Router,
    chat_service: Arc<ChatService>,
}

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseSettings {
            url: None,
            max_connections: 1,
            acquire_timeout_seconds: 1,
            connect_retries: 1,
            run_migrations: false,
        },
        llm: LlmSettings {
            provider: LlmProvider::OpenAi,
            base_url: None,
            azure_endpoint: None,
            api_key: String::new(),
            chat_model: "test-model".to_string(),
            max_tokens: None,
            temperature: None,
            request_timeout_seconds: 1,
        },
        generation: GenerationSettings {
            run_history_capacity: 16,
        },
        logging: LoggingSettings {
            level: "warn".to_string(),
            enable_json: false,
        },
    }
}

fn create_test_app(scripts: Vec<Script>) -> TestApp {
    let store = Arc::new(InMemoryConversationStore::new());
    let client = Arc::new(QueuedGenerationClient::new(scripts));
    let chat_service = Arc::new(ChatService::with_generation(store, client, 16));

    let state = AppState {
        chat_service: Arc::clone(&chat_service),
        settings: test_settings(),
        scaffold_config: ScaffoldConfig {
            enabled: false,
            mock_response_delay_ms: 0,
            mock_reply: String::new(),
        },
    };

    TestApp {
        router: create_router(state),
        chat_service,
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", TEST_USER)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", TEST_USER)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_chat(app: &TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request("POST", "/api/v1/chats", json!({"title": "Maths"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn wait_for_run(app: &TestApp, run_id: &str) {
    let run_id: RunId = run_id.parse().unwrap();
    app.chat_service.wait_for_run(run_id).await;
}

#[tokio::test]
async fn given_running_server_when_health_check_then_returns_ok() {
    let app = create_test_app(vec![]);

    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["runs_in_flight"], 0);
}

#[tokio::test]
async fn given_request_id_header_when_calling_api_then_it_is_echoed() {
    let app = create_test_app(vec![]);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn given_new_chat_when_sending_message_then_reply_appears_in_messages() {
    let app = create_test_app(vec![Script::reply(&["He", "llo", "!"])]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({"content": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    let run_id = body["run_id"].as_str().unwrap().to_string();
    wait_for_run(&app, &run_id).await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/chats/{}/messages", chat_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let messages = body_json(response).await;
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hello!");
    assert_eq!(messages[1]["status"], "complete");

    let response = app
        .router
        .oneshot(get_request(&format!("/api/v1/runs/{}", run_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let run = body_json(response).await;
    assert_eq!(run["status"], "COMPLETED");
    assert_eq!(run["fragments_committed"], 3);
}

#[tokio::test]
async fn given_sent_message_when_editing_then_original_is_reported_and_run_scheduled() {
    let app = create_test_app(vec![Script::reply(&["4"]), Script::reply(&["6"])]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({"content": "2+2?"}),
        ))
        .await
        .unwrap();
    let sent = body_json(response).await;
    wait_for_run(&app, sent["run_id"].as_str().unwrap()).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/v1/messages/{}", sent["message_id"].as_str().unwrap()),
            json!({"content": "3+3?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited = body_json(response).await;
    assert_eq!(edited["edited"], true);
    assert_eq!(edited["original_content"], "2+2?");
    wait_for_run(&app, edited["run_id"].as_str().unwrap()).await;

    let response = app
        .router
        .oneshot(get_request(&format!("/api/v1/chats/{}/messages", chat_id)))
        .await
        .unwrap();
    let messages = body_json(response).await;
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[1]["content"], "6");
}

#[tokio::test]
async fn given_authenticated_caller_when_listing_chats_then_own_chats_are_returned() {
    let app = create_test_app(vec![]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/chats"))
        .await
        .unwrap();
    let chats = body_json(response).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
    assert_eq!(chats[0]["id"], chat_id);
    assert_eq!(chats[0]["user_id"], TEST_USER);

    let anonymous = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/v1/chats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(anonymous).await, json!([]));
}

#[tokio::test]
async fn given_unknown_chat_when_sending_message_then_not_found() {
    let app = create_test_app(vec![]);

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/messages", uuid::Uuid::new_v4()),
            json!({"content": "hi"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_malformed_id_when_fetching_chat_then_bad_request() {
    let app = create_test_app(vec![]);

    let response = app
        .router
        .oneshot(get_request("/api/v1/chats/not-a-uuid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid chat ID"));
}

#[tokio::test]
async fn given_blank_content_when_sending_message_then_bad_request() {
    let app = create_test_app(vec![]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({"content": ""}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_idle_chat_when_cancelling_then_not_found() {
    let app = create_test_app(vec![]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/cancel", chat_id),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn given_streaming_chat_when_cancelling_then_accepted() {
    let (script, tx) = Script::channel();
    let app = create_test_app(vec![script]);
    let chat_id = create_chat(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/messages", chat_id),
            json!({"content": "long story please"}),
        ))
        .await
        .unwrap();
    let sent = body_json(response).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/chats/{}/cancel", chat_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["cancelled_run_id"], sent["run_id"]);

    wait_for_run(&app, sent["run_id"].as_str().unwrap()).await;
    let response = app
        .router
        .oneshot(get_request(&format!(
            "/api/v1/runs/{}",
            sent["run_id"].as_str().unwrap()
        )))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "CANCELLED");
    drop(tx);
}
