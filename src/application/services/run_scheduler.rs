use std::sync::Arc;

use crate::application::ports::{ConversationStore, RepositoryError};
use crate::domain::{ChatId, GenerationRun, MessageId, RunId};

use super::{GenerationRunner, RunContext, RunRegistry};

/// Starts generation runs as detached tasks. Each run takes the next chat
/// epoch, so only the most recently scheduled run of a chat can write.
pub struct RunScheduler {
    store: Arc<dyn ConversationStore>,
    runner: Arc<GenerationRunner>,
    registry: Arc<RunRegistry>,
}

impl RunScheduler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        runner: Arc<GenerationRunner>,
        registry: Arc<RunRegistry>,
    ) -> Self {
        Self {
            store,
            runner,
            registry,
        }
    }

    #[tracing::instrument(skip(self), fields(chat_id = %chat_id, trigger_message_id = %trigger_message_id))]
    pub async fn schedule(
        &self,
        chat_id: ChatId,
        trigger_message_id: MessageId,
    ) -> Result<RunId, RepositoryError> {
        let epoch = self.store.advance_epoch(chat_id).await?;
        let run = GenerationRun::new(chat_id, trigger_message_id, epoch);
        let run_id = run.id;
        let cancellation = self.registry.register(run);

        let ctx = RunContext {
            run_id,
            chat_id,
            trigger_message_id,
            epoch,
            cancellation,
        };
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            runner.run(ctx).await;
        });

        tracing::debug!(run_id = %run_id, epoch, "Generation run scheduled");
        Ok(run_id)
    }

    pub fn cancel(&self, chat_id: ChatId) -> Option<RunId> {
        let run_id = self.registry.cancel_chat(chat_id);
        if let Some(run_id) = run_id {
            tracing::info!(run_id = %run_id, chat_id = %chat_id, "Generation run cancellation requested");
        }
        run_id
    }

    /// Moves the chat to a new epoch without starting a run. A run started
    /// before that epoch loses its write access and is cancelled; one
    /// scheduled concurrently under a later epoch is left alone.
    pub async fn supersede(&self, chat_id: ChatId) -> Result<Option<RunId>, RepositoryError> {
        let epoch = self.store.advance_epoch(chat_id).await?;
        let run_id = self.registry.cancel_older_than(chat_id, epoch);
        if let Some(run_id) = run_id {
            tracing::info!(run_id = %run_id, chat_id = %chat_id, "Generation run superseded");
        }
        Ok(run_id)
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }
}
