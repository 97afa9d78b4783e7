//! Configuration schema definitions.
//!
//! The core config covers logging and the chat session; everything
//! adapter-specific lives under `adapters` as dynamic values, each
//! deserialized by its own adapter crate:
//!
//! ```yaml
//! logging:
//!   level: debug
//!   format: pretty
//!
//! chat:
//!   user_name: jido
//!   dedupe_limit: 1000
//!
//! adapters:
//!   telegram:
//!     token: ${TELEGRAM_TOKEN}
//!   discord:
//!     public_key: ${DISCORD_PUBLIC_KEY:-}
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SwitchboardConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Chat session configuration.
    pub chat: ChatConfig,

    /// Adapter-specific configurations, keyed by registered name.
    #[serde(default)]
    pub adapters: HashMap<String, serde_yaml::Value>,
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatConfig {
    /// The bot's own handle, used for mention detection.
    pub user_name: Option<String>,

    /// Bound on the dedupe set (default 1000 when unset).
    pub dedupe_limit: Option<u64>,

    /// Thread ids routed to subscribed handlers from the start.
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: LogLevel,

    /// Output format.
    pub format: LogFormat,

    /// Output target.
    pub output: LogOutput,

    /// Whether to include source file location.
    pub file_location: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Module-specific log level overrides.
    ///
    /// Example: `{ "switchboard_framework": "debug", "hyper": "warn" }`
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Log file path (only used when output is "file").
    pub file_path: Option<PathBuf>,
}

/// Log level enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Converts to tracing::Level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Converts to a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line format.
    #[default]
    Compact,
    /// Full format with all fields.
    Full,
    /// Multi-line human-friendly format.
    Pretty,
    /// JSON lines (requires the `json-log` feature).
    Json,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SwitchboardConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.chat.user_name.is_none());
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn levels_convert_to_tracing() {
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }
}
