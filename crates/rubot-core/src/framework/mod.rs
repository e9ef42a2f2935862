//! Framework layer - update processing.
//!
//! This module contains the pieces that react to updates:
//! - [`EventBus`], the phased publish/subscribe registry
//! - Middleware composition with an onion-style [`Next`](middleware::Next)
//! - [`Context`], the per-update value handed to every handler
//! - [`Dispatcher`], which routes an update through middleware and events

pub mod context;
pub mod dispatcher;
pub mod event_bus;
pub mod middleware;
pub mod view;

pub use context::Context;
pub use dispatcher::Dispatcher;
pub use event_bus::{AfterListener, EventBus, Flow, Listener, ListenerId, Next, Payload, Proceed};
pub use middleware::{Composed, Middleware, Terminal, compose, from_fn, noop_terminal};
pub use view::{CommandView, FileView, mime_for_extension, split_args};
