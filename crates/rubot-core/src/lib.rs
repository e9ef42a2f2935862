//! # Rubot Core
//!
//! The engine of the rubot Bot API SDK.
//!
//! This crate holds everything that does not depend on a concrete network
//! stack: the update model, the typed API surface, the event bus and the
//! dispatcher. The HTTP transport and the polling runtime live in
//! `rubot-transport` and `rubot-runtime`.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Data model and error taxonomy:
//! - **Updates**: [`Update`] and its variants, decoded leniently from JSON
//! - **Events**: the closed set of [`EventKind`]s
//! - **Errors**: [`TransportError`], [`ApiError`], [`UsageError`], [`MiddlewareError`]
//!
//! ### Framework Layer
//!
//! Update processing:
//! - **Event bus**: before/main/after phases with cancellation ([`EventBus`])
//! - **Middleware**: onion-style composition ([`compose`], [`from_fn`])
//! - **Dispatch**: update to events ([`Dispatcher`], [`Context`])
//!
//! ### Integration Layer
//!
//! The remote API:
//! - **Transport seam**: [`ApiTransport`]
//! - **Typed methods**: [`BotApi`]
//!
//! ## Update Flow
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐     ┌──────────┐
//! │  Fetcher  │────▶│ Dispatcher │────▶│ Middleware │────▶│ EventBus │
//! │ / Webhook │     │  (Context) │     │   chain    │     │  phases  │
//! └───────────┘     └────────────┘     └────────────┘     └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rubot_core::{BotApi, Dispatcher, EventBus, EventKind, Listener};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(EventBus::new());
//! bus.on(EventKind::Command, Listener::observer(|ctx| async move {
//!     if let Some(cmd) = ctx.command() && cmd.name == "ping" {
//!         ctx.reply("pong").await?;
//!     }
//!     Ok(())
//! }))?;
//!
//! let dispatcher = Dispatcher::new(bus, BotApi::new(transport));
//! dispatcher.handle_update(update).await;
//! ```

pub mod foundation;
pub mod framework;
pub mod integration;

pub use foundation::{
    ApiError, ApiResult, ApiStatus, AuxData, BoxError, ContactMessage, ErrorSink, EventKind,
    File, ForwardedFrom, ForwardedFromType, LiveLocation, LiveLocationStatus, Location, Message,
    MiddlewareError, PaymentState, PaymentStatus, Poll, PollState, PollStatus, SenderType,
    Sticker, TransportError, TransportResult, Update, UpdateBody, UsageError, UsageResult,
};
pub use framework::{
    AfterListener, CommandView, Composed, Context, Dispatcher, EventBus, FileView, Flow, Listener,
    ListenerId, Middleware, Next, Payload, Proceed, Terminal, compose, from_fn, noop_terminal,
};
pub use integration::{
    ApiTransport, Bot, BotApi, BotCommand, BoxedTransport, Button, ButtonType, Chat,
    ChatKeypadType, ChatType, FileType, Keypad, KeypadRow, RejectedUpdate, SendMessageOptions,
    UpdateBatch, UpdateEndpointType, UploadFile,
};
