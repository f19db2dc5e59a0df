use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::application::ports::{ConversationStore, RepositoryError};
use crate::domain::{Chat, ChatId, Message, MessageId, MessageRole, MessageStatus, UserId};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Change notification published after a write commits.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    MessageAppended(Message),
    MessageUpdated(Message),
}

/// Process-local store. Each operation holds the lock for its whole
/// read-modify-write, which makes every call atomic.
pub struct InMemoryConversationStore {
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Default)]
struct StoreState {
    chats: HashMap<ChatId, ChatRecord>,
    messages: HashMap<MessageId, Message>,
    by_chat: HashMap<ChatId, Vec<MessageId>>,
    next_sequence: i64,
}

struct ChatRecord {
    chat: Chat,
    epoch: u64,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            events,
        }
    }

    /// Live feed of committed message writes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    fn epoch_matches(&self, chat_id: ChatId, epoch: u64) -> bool {
        self.chats.get(&chat_id).is_some_and(|r| r.epoch == epoch)
    }

    fn insert_message(
        &mut self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> Result<Message, RepositoryError> {
        if !self.chats.contains_key(&chat_id) {
            return Err(RepositoryError::NotFound(format!("chat {}", chat_id)));
        }
        self.next_sequence += 1;
        let mut message = Message::new(chat_id, role, content.to_string(), status);
        message.sequence = self.next_sequence;

        self.by_chat.entry(chat_id).or_default().push(message.id);
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    fn update_message(
        &mut self,
        id: MessageId,
        f: impl FnOnce(&mut Message),
    ) -> Result<Message, RepositoryError> {
        let message = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("message {}", id)))?;
        f(message);
        message.updated_at = Utc::now();
        Ok(message.clone())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if state.chats.contains_key(&chat.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "chat {} already exists",
                chat.id
            )));
        }
        state.chats.insert(
            chat.id,
            ChatRecord {
                chat: chat.clone(),
                epoch: 0,
            },
        );
        Ok(())
    }

    async fn get_chat(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.lock().chats.get(&id).map(|r| r.chat.clone()))
    }

    async fn list_chats_by_user(&self, user_id: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let mut chats: Vec<Chat> = self
            .lock()
            .chats
            .values()
            .filter(|r| r.chat.user_id == Some(user_id))
            .map(|r| r.chat.clone())
            .collect();
        chats.sort_by_key(|c| c.created_at);
        Ok(chats)
    }

    async fn append(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let message =
            self.lock()
                .insert_message(chat_id, role, content, MessageStatus::Complete)?;
        self.publish(StoreEvent::MessageAppended(message.clone()));
        Ok(message)
    }

    async fn patch_content(&self, id: MessageId, content: &str) -> Result<(), RepositoryError> {
        let message = self
            .lock()
            .update_message(id, |m| m.content = content.to_string())?;
        self.publish(StoreEvent::MessageUpdated(message));
        Ok(())
    }

    async fn latest(&self, chat_id: ChatId) -> Result<Option<Message>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .by_chat
            .get(&chat_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.messages.get(id))
            .cloned())
    }

    async fn all_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .by_chat
            .get(&chat_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        Ok(self.lock().messages.get(&id).cloned())
    }

    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let edited = {
            let mut state = self.lock();
            match state.messages.get_mut(&id) {
                Some(message) => {
                    message.apply_edit(content.to_string());
                    Some(message.clone())
                }
                None => None,
            }
        };
        if let Some(message) = &edited {
            self.publish(StoreEvent::MessageUpdated(message.clone()));
        }
        Ok(edited)
    }

    async fn set_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        let message = self.lock().update_message(id, |m| m.status = status)?;
        self.publish(StoreEvent::MessageUpdated(message));
        Ok(())
    }

    async fn advance_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let record = state
            .chats
            .get_mut(&chat_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", chat_id)))?;
        record.epoch += 1;
        Ok(record.epoch)
    }

    async fn current_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        self.lock()
            .chats
            .get(&chat_id)
            .map(|r| r.epoch)
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", chat_id)))
    }

    async fn append_if_current(
        &self,
        chat_id: ChatId,
        epoch: u64,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError> {
        let appended = {
            let mut state = self.lock();
            if !state.epoch_matches(chat_id, epoch) {
                return Ok(None);
            }
            state.insert_message(chat_id, role, content, status)?
        };
        self.publish(StoreEvent::MessageAppended(appended.clone()));
        Ok(Some(appended))
    }

    async fn patch_if_current(
        &self,
        id: MessageId,
        chat_id: ChatId,
        epoch: u64,
        content: &str,
        status: MessageStatus,
    ) -> Result<bool, RepositoryError> {
        let patched = {
            let mut state = self.lock();
            if !state.epoch_matches(chat_id, epoch) {
                return Ok(false);
            }
            if state.messages.get(&id).is_none_or(|m| m.chat_id != chat_id) {
                return Ok(false);
            }
            state.update_message(id, |m| {
                m.content = content.to_string();
                m.status = status;
            })?
        };
        self.publish(StoreEvent::MessageUpdated(patched));
        Ok(true)
    }
}
