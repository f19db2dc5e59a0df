use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{ConversationStore, RepositoryError};
use crate::domain::{
    Chat, ChatId, Message, MessageId, MessageRole, MessageStatus, UserId,
};

const MESSAGE_COLUMNS: &str =
    "id, seq, chat_id, role, content, edited, original_content, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    if let Some(db_error) = e.as_database_error() {
        match db_error.code().as_deref() {
            Some("23503") => return RepositoryError::NotFound(db_error.message().to_string()),
            Some("23505") | Some("23514") => {
                return RepositoryError::ConstraintViolation(db_error.message().to_string());
            }
            _ => {}
        }
    }
    RepositoryError::QueryFailed(e.to_string())
}

fn chat_from_row(row: &PgRow) -> Result<Chat, RepositoryError> {
    let user_id: Option<uuid::Uuid> = row.try_get("user_id").map_err(query_failed)?;
    Ok(Chat {
        id: ChatId::from_uuid(row.try_get("id").map_err(query_failed)?),
        user_id: user_id.map(UserId::from_uuid),
        title: row.try_get("title").map_err(query_failed)?,
        is_guest: row.try_get("is_guest").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, RepositoryError> {
    let role: String = row.try_get("role").map_err(query_failed)?;
    let status: String = row.try_get("status").map_err(query_failed)?;

    Ok(Message {
        id: MessageId::from_uuid(row.try_get("id").map_err(query_failed)?),
        chat_id: ChatId::from_uuid(row.try_get("chat_id").map_err(query_failed)?),
        role: role
            .parse::<MessageRole>()
            .map_err(RepositoryError::QueryFailed)?,
        content: row.try_get("content").map_err(query_failed)?,
        edited: row.try_get("edited").map_err(query_failed)?,
        original_content: row.try_get("original_content").map_err(query_failed)?,
        status: status
            .parse::<MessageStatus>()
            .map_err(RepositoryError::QueryFailed)?,
        sequence: row.try_get("seq").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
        updated_at: row.try_get("updated_at").map_err(query_failed)?,
    })
}

fn epoch_from_db(value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value)
        .map_err(|_| RepositoryError::QueryFailed(format!("invalid generation epoch {}", value)))
}

fn epoch_to_db(value: u64) -> Result<i64, RepositoryError> {
    i64::try_from(value)
        .map_err(|_| RepositoryError::QueryFailed(format!("generation epoch {} out of range", value)))
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    #[instrument(skip(self, chat), fields(chat_id = %chat.id))]
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, user_id, title, is_guest, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(chat.id.as_uuid())
        .bind(chat.user_id.map(|u| u.as_uuid()))
        .bind(&chat.title)
        .bind(chat.is_guest)
        .bind(chat.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self), fields(chat_id = %id))]
    async fn get_chat(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, is_guest, created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(chat_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_chats_by_user(&self, user_id: UserId) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, is_guest, created_at
            FROM chats
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(chat_from_row).collect()
    }

    #[instrument(skip(self, content), fields(chat_id = %chat_id, role = %role))]
    async fn append(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (id, chat_id, role, content, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(MessageId::new().as_uuid())
        .bind(chat_id.as_uuid())
        .bind(role.as_str())
        .bind(content)
        .bind(MessageStatus::Complete.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;

        message_from_row(&row)
    }

    #[instrument(skip(self, content), fields(message_id = %id))]
    async fn patch_content(&self, id: MessageId, content: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn latest(&self, chat_id: ChatId) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE chat_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#
        ))
        .bind(chat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(message_from_row).transpose()
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn all_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE chat_id = $1
            ORDER BY seq ASC
            "#
        ))
        .bind(chat_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(message_from_row).collect()
    }

    #[instrument(skip(self), fields(message_id = %id))]
    async fn get(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(message_from_row).transpose()
    }

    #[instrument(skip(self, content), fields(message_id = %id))]
    async fn edit_message(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        // Right-hand sides read the pre-update row.
        let row = sqlx::query(&format!(
            r#"
            UPDATE messages
            SET original_content = COALESCE(original_content, content),
                content = $2,
                edited = TRUE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(message_from_row).transpose()
    }

    #[instrument(skip(self), fields(message_id = %id, status = %status))]
    async fn set_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn advance_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        let epoch: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE chats
            SET generation_epoch = generation_epoch + 1
            WHERE id = $1
            RETURNING generation_epoch
            "#,
        )
        .bind(chat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        epoch
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", chat_id)))
            .and_then(epoch_from_db)
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn current_epoch(&self, chat_id: ChatId) -> Result<u64, RepositoryError> {
        let epoch: Option<i64> =
            sqlx::query_scalar("SELECT generation_epoch FROM chats WHERE id = $1")
                .bind(chat_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed)?;

        epoch
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", chat_id)))
            .and_then(epoch_from_db)
    }

    #[instrument(skip(self, content), fields(chat_id = %chat_id, epoch = epoch))]
    async fn append_if_current(
        &self,
        chat_id: ChatId,
        epoch: u64,
        role: MessageRole,
        content: &str,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError> {
        // FOR SHARE makes a concurrent epoch bump wait or win, never interleave.
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (id, chat_id, role, content, status, created_at, updated_at)
            SELECT $1, $2, $3, $4, $5, $6, $6
            WHERE EXISTS (
                SELECT 1 FROM chats
                WHERE id = $2 AND generation_epoch = $7
                FOR SHARE
            )
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(MessageId::new().as_uuid())
        .bind(chat_id.as_uuid())
        .bind(role.as_str())
        .bind(content)
        .bind(status.as_str())
        .bind(now)
        .bind(epoch_to_db(epoch)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(message_from_row).transpose()
    }

    #[instrument(skip(self, content), fields(message_id = %id, epoch = epoch))]
    async fn patch_if_current(
        &self,
        id: MessageId,
        chat_id: ChatId,
        epoch: u64,
        content: &str,
        status: MessageStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2, status = $3, updated_at = NOW()
            WHERE id = $1
              AND chat_id = $4
              AND EXISTS (
                  SELECT 1 FROM chats
                  WHERE id = $4 AND generation_epoch = $5
                  FOR SHARE
              )
            "#,
        )
        .bind(id.as_uuid())
        .bind(content)
        .bind(status.as_str())
        .bind(chat_id.as_uuid())
        .bind(epoch_to_db(epoch)?)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected() == 1)
    }
}
