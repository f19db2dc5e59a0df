use crate::domain::{Chat, ChatId, Message, MessageId, MessageRole, MessageStatus, UserId};
use async_trait::async_trait;

use super::RepositoryError;

/// Durable chats and messages. Every call is atomic on its own; a read issued
/// after a completed write observes it.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError>;

    async fn get_chat(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;

    async fn list_chats_by_user(&self, user_id: UserId) -> Result<Vec<Chat>, RepositoryError>;

    async fn append(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError>;

    async fn patch_content(&self, id: MessageId, content: &str) -> Result<(), RepositoryError>;

    async fn latest(&self, chat_id: ChatId) -> Result<Option<Message>, RepositoryError>;

    async fn all_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError>;

    async fn get(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;

    /// Replaces the content, sets `edited` and captures the pre-edit text the
    /// first time only. Returns `None` when the message does not exist.
    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError>;

    async fn set_status(&self, id: MessageId, status: MessageStatus)
    -> Result<(), RepositoryError>;

    /// Bumps the chat's generation epoch and returns the new value.
    async fn advance_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError>;

    async fn current_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError>;

    /// Appends only while the chat epoch still equals `epoch`.
    async fn append_if_current(
        &self,
        chat_id: ChatId,
        epoch: u64,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError>;

    /// Overwrites content and status only while the chat epoch still equals
    /// `epoch`. Returns whether the write happened.
    async fn patch_if_current(
        &self,
        id: MessageId,
        chat_id: ChatId,
        epoch: u64,
        content: &str,
        status: MessageStatus,
    ) -> Result<bool, RepositoryError>;
}
