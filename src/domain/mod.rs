mod chat;
mod chat_id;
mod generation_run;
mod message;
mod message_id;
mod message_role;
mod message_status;
mod run_id;
mod run_status;
mod transcript;
mod user_id;

pub use chat::Chat;
pub use chat_id::ChatId;
pub use generation_run::GenerationRun;
pub use message::Message;
pub use message_id::MessageId;
pub use message_role::MessageRole;
pub use message_status::MessageStatus;
pub use run_id::RunId;
pub use run_status::RunStatus;
pub use transcript::{Transcript, TranscriptEntry};
pub use user_id::UserId;
