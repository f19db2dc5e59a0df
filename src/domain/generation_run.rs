use super::{ChatId, MessageId, RunId, RunStatus};
use chrono::{DateTime, Utc};

/// One execution of the streaming commit loop for a chat.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub id: RunId,
    pub chat_id: ChatId,
    pub trigger_message_id: MessageId,
    /// Chat generation epoch captured when the run was scheduled.
    pub epoch: u64,
    pub status: RunStatus,
    pub assistant_message_id: Option<MessageId>,
    pub fragments_committed: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationRun {
    pub fn new(chat_id: ChatId, trigger_message_id: MessageId, epoch: u64) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            chat_id,
            trigger_message_id,
            epoch,
            status: RunStatus::Queued,
            assistant_message_id: None,
            fragments_committed: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
