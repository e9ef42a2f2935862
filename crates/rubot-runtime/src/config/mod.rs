//! Configuration module for the rubot runtime.
//!
//! This module provides layered configuration loading (defaults, files,
//! `RUBOT_*` environment variables) and validation for the bot credentials,
//! polling, webhook and logging sections.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, PollingConfig, RubotConfig,
    SpanEventConfig, WebhookConfig,
};
pub use validation::{validate_config, validate_webhook};
