mod caller;
mod chats;
mod health;
mod messages;
mod responses;
mod runs;

pub use caller::{CallerIdentity, USER_ID_HEADER};
pub use chats::{
    cancel_generation_handler, chat_messages_handler, create_chat_handler, get_chat_handler,
    list_chats_handler,
};
pub use health::health_handler;
pub use messages::{edit_message_handler, send_message_handler};
pub use runs::run_status_handler;
