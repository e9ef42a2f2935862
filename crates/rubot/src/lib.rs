//! # Rubot
//!
//! An async SDK for building bots on the Rubika Bot API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌────────────┐     ┌────────────────────┐
//! │ getUpdates  │────▶│  Fetcher   │────▶│ Dispatcher │────▶│ EventBus           │
//! │ / webhook   │     │ (dedupe +  │     │ middleware │     │ before/main/after  │
//! └─────────────┘     │ freshness) │     └────────────┘     └────────────────────┘
//!                     └────────────┘
//! ```
//!
//! - **Core** (`rubot-core`): update model, event bus, middleware, dispatcher,
//!   typed API methods
//! - **Transport** (`rubot-transport`): reqwest client and axum webhook receiver
//! - **Runtime** (`rubot-runtime`): configuration, logging, polling, [`Rubot`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rubot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Rubot::builder().build()?;
//!
//!     bot.on(EventKind::Command, Listener::observer(|ctx| async move {
//!         if let Some(cmd) = ctx.command() && cmd.name == "ping" {
//!             ctx.reply("pong").await?;
//!         }
//!         Ok(())
//!     }))?;
//!
//!     bot.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `rubot.toml` (default)
//! - `yaml-config`: read `rubot.yaml`
//! - `json-log`: JSON log output
//! - `http-server`: webhook mode via `Rubot::run_webhook`

pub use rubot_core as core;
pub use rubot_runtime as runtime;
pub use rubot_transport as transport;

pub use rubot_runtime::{Rubot, RubotBuilder, RubotConfig};

/// Commonly used types for writing bots.
///
/// ```rust,ignore
/// use rubot::prelude::*;
/// ```
pub mod prelude {
    // Client
    pub use rubot_runtime::{Rubot, RubotBuilder, RubotConfig, RuntimeError};

    // Handlers
    pub use rubot_core::{
        AfterListener, BoxError, Context, EventKind, Flow, Listener, ListenerId, Next, Payload,
        from_fn,
    };

    // Views and API types
    pub use rubot_core::{
        ApiError, BotApi, Button, ChatKeypadType, CommandView, FileType, FileView, Keypad,
        KeypadRow, SendMessageOptions, Update, UpdateBody,
    };

    pub use rubot_runtime::prelude::*;
}
