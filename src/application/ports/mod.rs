mod conversation_store;
mod generation_client;
mod repository_error;

pub use conversation_store::ConversationStore;
pub use generation_client::{FragmentStream, GenerationClient, GenerationError};
pub use repository_error::RepositoryError;
