mod chat_service;
mod generation_runner;
mod run_registry;
mod run_scheduler;

pub use chat_service::{ChatService, ChatServiceError, EditOutcome, SendOutcome};
pub use generation_runner::{GenerationRunError, GenerationRunner, RunContext, RunOutcome};
pub use run_registry::RunRegistry;
pub use run_scheduler::RunScheduler;
