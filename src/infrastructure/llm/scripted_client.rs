use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{FragmentStream, GenerationClient, GenerationError};
use crate::domain::Transcript;

/// Replays a fixed reply as fragments. Used in scaffold mode.
pub struct ScriptedGenerationClient {
    fragments: Vec<String>,
    delay: Duration,
}

impl ScriptedGenerationClient {
    pub fn new(fragments: Vec<String>, delay: Duration) -> Self {
        Self { fragments, delay }
    }

    /// Splits `reply` into word-sized fragments, keeping the separators.
    pub fn from_reply(reply: &str, delay: Duration) -> Self {
        let fragments = reply
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        Self::new(fragments, delay)
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerationClient {
    async fn generate(&self, transcript: &Transcript) -> Result<FragmentStream, GenerationError> {
        tracing::debug!(entries = transcript.len(), "Scripted generation started");
        let fragments = self.fragments.clone();
        let delay = self.delay;

        Ok(Box::pin(async_stream::stream! {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(fragment);
            }
        }))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
