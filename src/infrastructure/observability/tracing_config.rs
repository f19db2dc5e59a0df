use std::str::FromStr;

use crate::presentation::config::LoggingSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Subscriber options. `LOG_FORMAT=json` forces JSON output even when
/// settings ask for text.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    pub format: LogFormat,
    pub filter: Option<String>,
}

impl TracingConfig {
    pub fn from_settings(environment: &str, logging: &LoggingSettings) -> Self {
        let format = if logging.enable_json {
            LogFormat::Json
        } else {
            format_from_env()
        };
        Self {
            environment: environment.to_string(),
            format,
            filter: Some(logging.level.clone()).filter(|level| !level.trim().is_empty()),
        }
    }
}

fn format_from_env() -> LogFormat {
    std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            format: format_from_env(),
            filter: None,
        }
    }
}
