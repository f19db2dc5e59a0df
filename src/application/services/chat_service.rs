use std::sync::Arc;

use crate::application::ports::{ConversationStore, GenerationClient, RepositoryError};
use crate::domain::{
    Chat, ChatId, GenerationRun, Message, MessageId, MessageRole, MessageStatus, RunId, RunStatus,
    UserId,
};
use crate::infrastructure::observability::sanitize_prompt;

use super::{GenerationRunner, RunRegistry, RunScheduler};

pub struct SendOutcome {
    pub message: Message,
    pub run_id: RunId,
}

pub struct EditOutcome {
    pub message: Message,
    pub run_id: Option<RunId>,
}

/// Inbound chat operations. Writes that should produce a reply hand off to
/// the scheduler and return without waiting for generation.
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    scheduler: Arc<RunScheduler>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, scheduler: Arc<RunScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Wires the registry, runner and scheduler around one store and client.
    pub fn with_generation(
        store: Arc<dyn ConversationStore>,
        client: Arc<dyn GenerationClient>,
        run_history_capacity: usize,
    ) -> Self {
        let registry = Arc::new(RunRegistry::new(run_history_capacity));
        let runner = Arc::new(GenerationRunner::new(
            Arc::clone(&store),
            client,
            Arc::clone(&registry),
        ));
        let scheduler = Arc::new(RunScheduler::new(Arc::clone(&store), runner, registry));
        Self::new(store, scheduler)
    }

    #[tracing::instrument(skip(self, title))]
    pub async fn create_chat(
        &self,
        title: &str,
        is_guest: bool,
        caller: Option<UserId>,
    ) -> Result<Chat, ChatServiceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatServiceError::InvalidInput(
                "chat title must not be empty".to_string(),
            ));
        }

        let chat = Chat::new(title.to_string(), caller, is_guest);
        self.store.create_chat(&chat).await?;
        tracing::info!(chat_id = %chat.id, "Chat created");
        Ok(chat)
    }

    /// Chats owned by the caller. Unauthenticated callers get none.
    pub async fn list_chats(&self, caller: Option<UserId>) -> Result<Vec<Chat>, ChatServiceError> {
        match caller {
            Some(user_id) => Ok(self.store.list_chats_by_user(user_id).await?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, ChatServiceError> {
        Ok(self.store.get_chat(chat_id).await?)
    }

    pub async fn get_chat_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, ChatServiceError> {
        self.require_chat(chat_id).await?;
        Ok(self.store.all_messages(chat_id).await?)
    }

    #[tracing::instrument(skip(self, content), fields(chat_id = %chat_id))]
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        content: &str,
    ) -> Result<SendOutcome, ChatServiceError> {
        validate_content(content)?;
        self.require_chat(chat_id).await?;

        tracing::debug!(content = %sanitize_prompt(content), "Appending user message");
        let message = self.store.append(chat_id, MessageRole::User, content).await?;
        let run_id = self.scheduler.schedule(chat_id, message.id).await?;

        Ok(SendOutcome { message, run_id })
    }

    #[tracing::instrument(skip(self, content), fields(message_id = %message_id))]
    pub async fn edit_message(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> Result<EditOutcome, ChatServiceError> {
        validate_content(content)?;

        let existing = self
            .store
            .get(message_id)
            .await?
            .ok_or_else(|| ChatServiceError::NotFound(format!("message {}", message_id)))?;

        // Fence off any reply still streaming before the correction lands.
        if existing.is_assistant() {
            self.scheduler.supersede(existing.chat_id).await?;
        }

        let mut message = self
            .store
            .edit_message(message_id, content)
            .await?
            .ok_or_else(|| ChatServiceError::NotFound(format!("message {}", message_id)))?;

        // A hand-edited reply is final, whatever state the fenced-off run left it in.
        if message.is_assistant() && message.status != MessageStatus::Complete {
            self.store
                .set_status(message.id, MessageStatus::Complete)
                .await?;
            message.status = MessageStatus::Complete;
        }

        let run_id = match message.role {
            MessageRole::User => Some(self.scheduler.schedule(message.chat_id, message.id).await?),
            MessageRole::Assistant => None,
        };

        tracing::info!(role = %message.role, regenerating = run_id.is_some(), "Message edited");
        Ok(EditOutcome { message, run_id })
    }

    pub fn cancel_generation(&self, chat_id: ChatId) -> Option<RunId> {
        self.scheduler.cancel(chat_id)
    }

    pub fn runs_in_flight(&self) -> usize {
        self.scheduler.registry().in_flight()
    }

    pub fn get_run(&self, run_id: RunId) -> Option<GenerationRun> {
        self.scheduler.registry().get(run_id)
    }

    pub async fn wait_for_run(&self, run_id: RunId) -> Option<RunStatus> {
        self.scheduler.registry().wait_for(run_id).await
    }

    async fn require_chat(&self, chat_id: ChatId) -> Result<Chat, ChatServiceError> {
        self.store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ChatServiceError::NotFound(format!("chat {}", chat_id)))
    }
}

fn validate_content(content: &str) -> Result<(), ChatServiceError> {
    if content.trim().is_empty() {
        return Err(ChatServiceError::InvalidInput(
            "message content must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}
