use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::Transcript;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Remote text generation. The returned stream is lazy, finite and cannot be
/// restarted; every item it yields is a non-empty delta.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, transcript: &Transcript) -> Result<FragmentStream, GenerationError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("rate limited")]
    RateLimited,
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
