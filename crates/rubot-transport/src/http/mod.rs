//! HTTP transports.
//!
//! This module provides the Bot API client and the webhook receiver.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::HttpTransport;

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{WebhookHandle, WebhookServer, decode_update};
