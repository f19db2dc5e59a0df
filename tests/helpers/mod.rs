#![allow(dead_code)]

mod test_postgres;

pub use test_postgres::TestPostgres;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use parley::application::ports::{
    ConversationStore, FragmentStream, GenerationClient, GenerationError, RepositoryError,
};
use parley::domain::{
    Chat, ChatId, Message, MessageId, MessageRole, MessageStatus, Transcript, UserId,
};
use parley::infrastructure::persistence::InMemoryConversationStore;

pub type FragmentSender = mpsc::UnboundedSender<Result<String, GenerationError>>;

/// What the next `generate` call does.
pub enum Script {
    Fragments(Vec<Result<String, GenerationError>>),
    Channel(mpsc::UnboundedReceiver<Result<String, GenerationError>>),
    Fail(GenerationError),
}

impl Script {
    pub fn reply(fragments: &[&str]) -> Self {
        Script::Fragments(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn channel() -> (Self, FragmentSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Script::Channel(rx), tx)
    }
}

/// Generation client that plays one queued script per call and records the
/// transcripts it was given.
#[derive(Default)]
pub struct QueuedGenerationClient {
    scripts: Mutex<VecDeque<Script>>,
    transcripts: Mutex<Vec<Transcript>>,
}

impl QueuedGenerationClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for QueuedGenerationClient {
    async fn generate(&self, transcript: &Transcript) -> Result<FragmentStream, GenerationError> {
        self.transcripts.lock().unwrap().push(transcript.clone());
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Fragments(items)) => Ok(Box::pin(futures::stream::iter(items))),
            Some(Script::Channel(rx)) => Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(Script::Fail(e)) => Err(e),
            None => Err(GenerationError::ProviderError(
                "no scripted reply left".to_string(),
            )),
        }
    }

    fn model_name(&self) -> &str {
        "queued-test"
    }
}

/// In-memory store whose guarded patches start failing after a number of
/// successful calls.
pub struct FlakyStore {
    pub inner: InMemoryConversationStore,
    fail_patches_after: usize,
    patches: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fail_patches_after: usize) -> Self {
        Self {
            inner: InMemoryConversationStore::new(),
            fail_patches_after,
            patches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        self.inner.create_chat(chat).await
    }

    async fn get_chat(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        self.inner.get_chat(id).await
    }

    async fn list_chats_by_user(&self, user_id: UserId) -> Result<Vec<Chat>, RepositoryError> {
        self.inner.list_chats_by_user(user_id).await
    }

    async fn append(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        self.inner.append(chat_id, role, content).await
    }

    async fn patch_content(&self, id: MessageId, content: &str) -> Result<(), RepositoryError> {
        self.inner.patch_content(id, content).await
    }

    async fn latest(&self, chat_id: ChatId) -> Result<Option<Message>, RepositoryError> {
        self.inner.latest(chat_id).await
    }

    async fn all_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        self.inner.all_messages(chat_id).await
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        self.inner.get(id).await
    }

    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        self.inner.edit_message(id, content).await
    }

    async fn set_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.set_status(id, status).await
    }

    async fn advance_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        self.inner.advance_epoch(chat_id).await
    }

    async fn current_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        self.inner.current_epoch(chat_id).await
    }

    async fn append_if_current(
        &self,
        chat_id: ChatId,
        epoch: u64,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError> {
        self.inner
            .append_if_current(chat_id, epoch, role, content, status)
            .await
    }

    async fn patch_if_current(
        &self,
        id: MessageId,
        chat_id: ChatId,
        epoch: u64,
        content: &str,
        status: MessageStatus,
    ) -> Result<bool, RepositoryError> {
        let seen = self.patches.fetch_add(1, Ordering::SeqCst);
        if seen >= self.fail_patches_after {
            return Err(RepositoryError::ConnectionFailed(
                "connection reset".to_string(),
            ));
        }
        self.inner
            .patch_if_current(id, chat_id, epoch, content, status)
            .await
    }
}

pub async fn create_chat(store: &dyn ConversationStore, owner: Option<UserId>) -> ChatId {
    let chat = Chat::new("Test chat".to_string(), owner, owner.is_none());
    store
        .create_chat(&chat)
        .await
        .expect("Failed to create chat");
    chat.id
}

pub async fn seed_messages(
    store: &dyn ConversationStore,
    chat_id: ChatId,
    messages: &[(MessageRole, &str)],
) -> Vec<Message> {
    let mut stored = Vec::new();
    for (role, content) in messages {
        stored.push(
            store
                .append(chat_id, *role, content)
                .await
                .expect("Failed to append message"),
        );
    }
    stored
}

pub fn assistant_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.is_assistant()).collect()
}
