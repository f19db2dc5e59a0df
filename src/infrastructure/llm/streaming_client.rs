use std::time::Duration;

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{FragmentStream, GenerationClient, GenerationError};
use crate::domain::Transcript;
use crate::presentation::config::{LlmProvider, LlmSettings};

use super::sse_decoder::{SseDecoder, SseEvent};

/// OpenAI-compatible chat completions client. The whole transcript is sent
/// as a single user message.
pub struct OpenAiStreamingClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiStreamingClient {
    fn build_request(&self, transcript: &Transcript) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: transcript.to_prompt(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.provider {
            LlmProvider::Azure => request.header("api-key", &self.api_key),
            _ => request.header("Authorization", format!("Bearer {}", self.api_key)),
        }
    }

    fn completions_url(&self) -> String {
        match self.provider {
            LlmProvider::Azure => format!(
                "{}/chat/completions?api-version=2024-06-01",
                self.base_url
            ),
            _ => format!("{}/chat/completions", self.base_url),
        }
    }
}

/// Extracts the text delta of one completion chunk. Empty deltas (role
/// announcements, finish markers) yield `None`.
pub fn parse_fragment(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[async_trait]
impl GenerationClient for OpenAiStreamingClient {
    async fn generate(&self, transcript: &Transcript) -> Result<FragmentStream, GenerationError> {
        let request_body = self.build_request(transcript);

        let request = self.client.post(self.completions_url()).json(&request_body);
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| GenerationError::ProviderError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ProviderError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let mut bytes = response.bytes_stream();
        let fragments = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(GenerationError::StreamInterrupted(e.to_string()));
                        return;
                    }
                };
                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Data(data) => match parse_fragment(&data) {
                            Ok(Some(fragment)) => {
                                yield Ok(fragment);
                            }
                            Ok(None) => {}
                            Err(e) => tracing::debug!(error = %e, "Skipping unparseable stream event"),
                        },
                        SseEvent::Done => return,
                    }
                }
            }
            if let Some(SseEvent::Data(data)) = decoder.finish() {
                if let Ok(Some(fragment)) = parse_fragment(&data) {
                    yield Ok(fragment);
                }
            }
        };

        Ok(Box::pin(fragments))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds the client from settings. Endpoint and key are read once here.
pub fn create_generation_client(
    settings: &LlmSettings,
) -> Result<OpenAiStreamingClient, GenerationError> {
    let base_url = match settings.provider {
        LlmProvider::OpenAi => settings
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string(),
        LlmProvider::Compatible => settings
            .base_url
            .clone()
            .ok_or_else(|| {
                GenerationError::InvalidConfiguration(
                    "base_url required for compatible provider".to_string(),
                )
            })?
            .trim_end_matches('/')
            .to_string(),
        LlmProvider::Azure => {
            let endpoint = settings.azure_endpoint.as_ref().ok_or_else(|| {
                GenerationError::InvalidConfiguration(
                    "azure_endpoint required for azure provider".to_string(),
                )
            })?;
            format!(
                "{}/openai/deployments/{}",
                endpoint.trim_end_matches('/'),
                settings.chat_model
            )
        }
    };

    if settings.api_key.is_empty() {
        tracing::warn!(provider = ?settings.provider, "LLM api key is empty");
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_seconds))
        .build()
        .map_err(|e| GenerationError::InvalidConfiguration(e.to_string()))?;

    Ok(OpenAiStreamingClient {
        client,
        provider: settings.provider,
        base_url,
        api_key: settings.api_key.clone(),
        model: settings.chat_model.clone(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    })
}
