//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RubotConfig {
    /// Credentials and API endpoint.
    #[serde(default)]
    pub bot: BotConfig,

    /// Long-polling behaviour.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Webhook receiver settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot credentials and API endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by BotFather.
    #[serde(default)]
    pub token: String,

    /// API base URL; a trailing slash is optional.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn default_base_url() -> String {
    "https://botapi.rubika.ir/v3/".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

// =============================================================================
// Polling
// =============================================================================

/// Long-polling configuration.
///
/// The freshness window and the poll interval are independent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Maximum age in seconds of a new or edited message to still dispatch it.
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,

    /// Delay in milliseconds between polls once caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Page size passed to `getUpdates`; server default when unset.
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            limit: None,
        }
    }
}

impl PollingConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_freshness_window_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    2000
}

// =============================================================================
// Webhook
// =============================================================================

/// Webhook receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path updates are POSTed to.
    #[serde(default = "default_webhook_path")]
    pub path: String,

    /// Public URL registered with `updateBotEndpoints`, if any.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_webhook_path(),
            public_url: None,
        }
    }
}

impl WebhookConfig {
    /// `host:port` bind address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_webhook_path() -> String {
    "/rubika".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
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
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; otherwise falls back to compact.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rollover period of file output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the call site.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// How often the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Rolled files kept on disk; older ones are deleted.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-module levels, e.g. `rubot_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RubotConfig::default();
        assert_eq!(config.bot.base_url, "https://botapi.rubika.ir/v3/");
        assert_eq!(config.bot.timeout(), Duration::from_secs(30));
        assert_eq!(config.polling.freshness_window(), Duration::from_secs(5));
        assert_eq!(config.polling.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.webhook.addr(), "0.0.0.0:8080");
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RubotConfig = serde_json::from_value(serde_json::json!({
            "bot": { "token": "abc" },
            "polling": { "poll_interval_ms": 500 },
            "logging": { "level": "debug", "filters": { "rubot_core": "trace" } }
        }))
        .unwrap();

        assert_eq!(config.bot.token, "abc");
        assert_eq!(config.bot.timeout_ms, 30000);
        assert_eq!(config.polling.poll_interval_ms, 500);
        assert_eq!(config.polling.freshness_window_secs, 5);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["rubot_core"], LogLevel::Trace);
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result: Result<LoggingConfig, _> =
            serde_json::from_value(serde_json::json!({ "level": "verbose" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let bot = BotConfig {
            token: "very-secret".into(),
            ..Default::default()
        };
        assert!(!format!("{bot:?}").contains("very-secret"));
    }
}
