use std::time::Duration;

const DEFAULT_REPLY: &str = "Hello from scaffold mode! This reply is streamed word by word.";
const DEFAULT_FRAGMENT_DELAY_MS: u64 = 50;

/// Scaffold mode swaps in the in-memory store and a scripted reply so the
/// service runs without a database or provider key.
#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    pub enabled: bool,
    pub mock_response_delay_ms: u64,
    pub mock_reply: String,
}

impl ScaffoldConfig {
    /// Builds the config from `SCAFFOLD_MODE`, `MOCK_RESPONSE_DELAY` and
    /// `MOCK_REPLY` as resolved by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("SCAFFOLD_MODE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        let mock_response_delay_ms = lookup("MOCK_RESPONSE_DELAY")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_FRAGMENT_DELAY_MS);
        let mock_reply = lookup("MOCK_REPLY")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REPLY.to_string());

        Self {
            enabled,
            mock_response_delay_ms,
            mock_reply,
        }
    }

    pub fn fragment_delay(&self) -> Duration {
        Duration::from_millis(self.mock_response_delay_ms)
    }
}

impl Default for ScaffoldConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
