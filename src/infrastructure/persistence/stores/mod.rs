mod in_memory_conversation_store;
mod pg_conversation_store;

pub use in_memory_conversation_store::{InMemoryConversationStore, StoreEvent};
pub use pg_conversation_store::PgConversationStore;
