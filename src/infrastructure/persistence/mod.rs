mod pg_pool;
mod stores;

pub use pg_pool::{create_pool, run_migrations};
pub use stores::{InMemoryConversationStore, PgConversationStore, StoreEvent};
