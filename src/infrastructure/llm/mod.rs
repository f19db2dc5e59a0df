mod scripted_client;
mod sse_decoder;
mod streaming_client;

pub use scripted_client::ScriptedGenerationClient;
pub use sse_decoder::{SseDecoder, SseEvent};
pub use streaming_client::{OpenAiStreamingClient, create_generation_client, parse_fragment};
