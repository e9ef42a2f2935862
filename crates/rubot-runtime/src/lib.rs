//! Rubot Runtime - configuration, logging and the polling client.
//!
//! This crate provides:
//! - Layered configuration (`RubotConfig`, `ConfigLoader`)
//! - Subscriber setup for `tracing` (`LoggingBuilder`)
//! - The long-polling loop with duplicate and freshness filtering
//!   (`UpdateFetcher`)
//! - The `Rubot` client that wires transport, dispatcher and fetcher
//!
//! # Polling
//!
//! ```ignore
//! use rubot_runtime::Rubot;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Rubot::builder().build()?;
//!     bot.on(EventKind::NewMessage, Listener::observer(|ctx| async move {
//!         ctx.reply(ctx.text()).await?;
//!         Ok(())
//!     }))?;
//!
//!     // Run until Ctrl+C
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Webhook
//!
//! With the `http-server` feature, `Rubot::run_webhook` receives updates on
//! `webhook.host:webhook.port` + `webhook.path` instead of polling.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PollingConfig,
    RubotConfig, WebhookConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use fetcher::{
    Clock, FetcherSettings, SystemClock, UpdateCallback, UpdateFetcher, UpdateSource,
    effective_time,
};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};
pub use runtime::{Rubot, RubotBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
