use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::application::ports::{
    ConversationStore, GenerationClient, GenerationError, RepositoryError,
};
use crate::domain::{ChatId, MessageId, MessageRole, MessageStatus, RunId, RunStatus, Transcript};
use crate::infrastructure::observability::sanitize_prompt;

use super::RunRegistry;

pub struct RunContext {
    pub run_id: RunId,
    pub chat_id: ChatId,
    pub trigger_message_id: MessageId,
    pub epoch: u64,
    pub cancellation: CancellationToken,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Superseded,
    Cancelled,
}

impl From<RunOutcome> for RunStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunStatus::Completed,
            RunOutcome::Superseded => RunStatus::Superseded,
            RunOutcome::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// Streaming commit loop: folds the fragment stream into one growing
/// assistant message, committing every increment before pulling the next.
pub struct GenerationRunner {
    store: Arc<dyn ConversationStore>,
    client: Arc<dyn GenerationClient>,
    registry: Arc<RunRegistry>,
}

/// Run-scoped state carried between fragments.
struct StreamTarget {
    message_id: Option<MessageId>,
    response_text: String,
}

enum Commit {
    Written(MessageId),
    Stale,
}

impl GenerationRunner {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        client: Arc<dyn GenerationClient>,
        registry: Arc<RunRegistry>,
    ) -> Self {
        Self {
            store,
            client,
            registry,
        }
    }

    /// Executes one run to a terminal status and records it in the registry.
    pub async fn run(&self, ctx: RunContext) -> RunStatus {
        let span = tracing::info_span!(
            "generation_run",
            run_id = %ctx.run_id,
            chat_id = %ctx.chat_id,
            trigger_message_id = %ctx.trigger_message_id,
            epoch = ctx.epoch,
            model = %self.client.model_name(),
        );

        async {
            let (status, error_message) = match self.execute(&ctx).await {
                Ok(outcome) => {
                    tracing::info!(outcome = ?outcome, "Generation run finished");
                    (RunStatus::from(outcome), None)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Generation run failed");
                    (RunStatus::Failed, Some(e.to_string()))
                }
            };
            self.registry.set_status(ctx.run_id, status, error_message);
            status
        }
        .instrument(span)
        .await
    }

    pub async fn execute(&self, ctx: &RunContext) -> Result<RunOutcome, GenerationRunError> {
        let messages = self
            .store
            .all_messages(ctx.chat_id)
            .await
            .map_err(GenerationRunError::Store)?;
        let transcript = Transcript::from_messages(&messages);

        tracing::debug!(
            messages = transcript.len(),
            prompt = %sanitize_prompt(&transcript.to_prompt()),
            "Transcript assembled"
        );

        self.registry
            .set_status(ctx.run_id, RunStatus::Streaming, None);

        let mut target = StreamTarget {
            message_id: None,
            response_text: String::new(),
        };

        let mut stream = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                self.mark_failed(ctx, &target).await;
                return self.stopped_outcome(ctx).await;
            }
            result = self.client.generate(&transcript) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    self.mark_failed(ctx, &target).await;
                    return Err(GenerationRunError::Generation(e));
                }
            },
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancellation.cancelled() => {
                    self.mark_failed(ctx, &target).await;
                    return self.stopped_outcome(ctx).await;
                }
                next = stream.next() => next,
            };

            let fragment = match next {
                Some(Ok(fragment)) => fragment,
                Some(Err(e)) => {
                    tracing::warn!(
                        error = %e,
                        committed_chars = target.response_text.len(),
                        "Fragment stream broke, keeping partial reply"
                    );
                    self.mark_failed(ctx, &target).await;
                    return Err(GenerationRunError::Generation(e));
                }
                None => break,
            };

            if fragment.is_empty() {
                continue;
            }
            target.response_text.push_str(&fragment);

            match self.commit(ctx, &mut target).await {
                Ok(Commit::Written(message_id)) => {
                    self.registry.record_commit(ctx.run_id, message_id);
                }
                Ok(Commit::Stale) => {
                    tracing::info!("Chat moved to a newer generation, stopping without writing");
                    return Ok(RunOutcome::Superseded);
                }
                Err(e) => {
                    self.mark_failed(ctx, &target).await;
                    return Err(GenerationRunError::Store(e));
                }
            }
        }

        let Some(message_id) = target.message_id else {
            tracing::debug!("Fragment stream was empty, nothing committed");
            if let Err(e) = self.settle_abandoned_reply(ctx).await {
                tracing::warn!(error = %e, "Failed to settle abandoned reply");
            }
            return Ok(RunOutcome::Completed);
        };

        let current = self
            .store
            .patch_if_current(
                message_id,
                ctx.chat_id,
                ctx.epoch,
                &target.response_text,
                MessageStatus::Complete,
            )
            .await
            .map_err(GenerationRunError::Store)?;

        if current {
            tracing::debug!(
                message_id = %message_id,
                chars = target.response_text.len(),
                "Assistant reply complete"
            );
            Ok(RunOutcome::Completed)
        } else {
            Ok(RunOutcome::Superseded)
        }
    }

    /// Writes the accumulated text. The first write discovers its target: a
    /// trailing assistant message is adopted, anything else gets a fresh
    /// assistant message. Later writes reuse the held id.
    async fn commit(
        &self,
        ctx: &RunContext,
        target: &mut StreamTarget,
    ) -> Result<Commit, RepositoryError> {
        if let Some(message_id) = target.message_id {
            let written = self
                .store
                .patch_if_current(
                    message_id,
                    ctx.chat_id,
                    ctx.epoch,
                    &target.response_text,
                    MessageStatus::InProgress,
                )
                .await?;
            return Ok(if written {
                Commit::Written(message_id)
            } else {
                Commit::Stale
            });
        }

        let latest = self.store.latest(ctx.chat_id).await?;
        match latest {
            Some(message) if message.is_assistant() => {
                let written = self
                    .store
                    .patch_if_current(
                        message.id,
                        ctx.chat_id,
                        ctx.epoch,
                        &target.response_text,
                        MessageStatus::InProgress,
                    )
                    .await?;
                if !written {
                    return Ok(Commit::Stale);
                }
                tracing::debug!(message_id = %message.id, "Adopted trailing assistant message");
                target.message_id = Some(message.id);
                Ok(Commit::Written(message.id))
            }
            _ => {
                let appended = self
                    .store
                    .append_if_current(
                        ctx.chat_id,
                        ctx.epoch,
                        MessageRole::Assistant,
                        &target.response_text,
                        MessageStatus::InProgress,
                    )
                    .await?;
                match appended {
                    Some(message) => {
                        tracing::debug!(message_id = %message.id, "Appended assistant message");
                        target.message_id = Some(message.id);
                        Ok(Commit::Written(message.id))
                    }
                    None => Ok(Commit::Stale),
                }
            }
        }
    }

    /// Marks the reply this run was writing as `Failed`. Before a target is
    /// adopted, a reply left `InProgress` by a superseded run is settled
    /// instead.
    async fn mark_failed(&self, ctx: &RunContext, target: &StreamTarget) {
        let result = match target.message_id {
            Some(message_id) => self
                .store
                .patch_if_current(
                    message_id,
                    ctx.chat_id,
                    ctx.epoch,
                    &target.response_text,
                    MessageStatus::Failed,
                )
                .await
                .map(|_| ()),
            None => self.settle_abandoned_reply(ctx).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to mark reply as failed");
        }
    }

    /// A trailing assistant message still `InProgress` belongs to a run that
    /// lost the epoch mid-stream. Nobody else will finish it.
    async fn settle_abandoned_reply(&self, ctx: &RunContext) -> Result<(), RepositoryError> {
        let Some(message) = self.store.latest(ctx.chat_id).await? else {
            return Ok(());
        };
        if !message.is_assistant() || message.status != MessageStatus::InProgress {
            return Ok(());
        }
        let settled = self
            .store
            .patch_if_current(
                message.id,
                ctx.chat_id,
                ctx.epoch,
                &message.content,
                MessageStatus::Failed,
            )
            .await?;
        if settled {
            tracing::debug!(message_id = %message.id, "Settled abandoned reply as failed");
        }
        Ok(())
    }

    async fn stopped_outcome(&self, ctx: &RunContext) -> Result<RunOutcome, GenerationRunError> {
        let epoch = self
            .store
            .current_epoch(ctx.chat_id)
            .await
            .map_err(GenerationRunError::Store)?;
        if epoch != ctx.epoch {
            Ok(RunOutcome::Superseded)
        } else {
            Ok(RunOutcome::Cancelled)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationRunError {
    #[error("generation: {0}")]
    Generation(GenerationError),
    #[error("store: {0}")]
    Store(RepositoryError),
}
