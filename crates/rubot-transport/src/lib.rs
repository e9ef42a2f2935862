//! # Rubot Transport
//!
//! Network implementations for the rubot SDK.
//!
//! `rubot-core` only knows the [`ApiTransport`](rubot_core::ApiTransport)
//! seam. This crate plugs real HTTP into it and, optionally, receives
//! updates pushed by the Bot API to a webhook.
//!
//! ## Features
//!
//! - `http-client`: [`HttpTransport`](http::HttpTransport), a reqwest-backed `ApiTransport`
//! - `http-server`: [`WebhookServer`](http::WebhookServer), an axum update receiver
//! - `full`: both
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  rubot-runtime      │  (fetcher, webhook loop)
//! ├─────────────────────┤
//! │  rubot-core         │  (ApiTransport seam, BotApi)
//! ├─────────────────────┤
//! │  rubot-transport    │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rubot_core::BotApi;
//! use rubot_transport::http::HttpTransport;
//!
//! let transport = HttpTransport::new(
//!     "https://botapi.rubika.ir/v3/",
//!     token,
//!     Duration::from_secs(30),
//! )?;
//! let api = BotApi::new(Arc::new(transport));
//! let me = api.get_me().await?;
//! ```

pub mod http;
