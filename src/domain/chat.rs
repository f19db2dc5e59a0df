use super::{ChatId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: ChatId,
    pub user_id: Option<UserId>,
    pub title: String,
    pub is_guest: bool,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(title: String, user_id: Option<UserId>, is_guest: bool) -> Self {
        Self {
            id: ChatId::new(),
            user_id,
            title,
            is_guest,
            created_at: Utc::now(),
        }
    }
}
