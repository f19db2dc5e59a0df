use super::{ChatId, MessageId, MessageRole, MessageStatus};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub role: MessageRole,
    pub content: String,
    pub edited: bool,
    /// Text before the first edit. Written once and never replaced.
    pub original_content: Option<String>,
    pub status: MessageStatus,
    /// Insertion order within the store. Assigned on append.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat_id: ChatId,
        role: MessageRole,
        content: String,
        status: MessageStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            chat_id,
            role,
            content,
            edited: false,
            original_content: None,
            status,
            sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_edit(&mut self, content: String) {
        if self.original_content.is_none() {
            self.original_content = Some(std::mem::take(&mut self.content));
        }
        self.content = content;
        self.edited = true;
        self.updated_at = Utc::now();
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}
