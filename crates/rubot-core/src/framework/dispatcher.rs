//! Update dispatcher.
//!
//! The [`Dispatcher`] turns one [`Update`] into a sequence of event
//! emissions on the shared [`EventBus`]:
//!
//! 1. Build a [`Context`] for the update
//! 2. Run the composed middleware chain with a no-op terminal
//! 3. Emit the variant events derived from the update, in a fixed order
//! 4. Emit [`EventKind::Update`] last
//!
//! Middleware does not gate the events; a middleware that never calls
//! `next` only skips the middleware after it. Use a before-phase listener to
//! cancel an event.
//!
//! Failures from middleware or listeners end the dispatch and are reported
//! through the error event. They never escape [`Dispatcher::handle_update`].
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(bus, api);
//! dispatcher.use_middleware(from_fn(|ctx, next| async move {
//!     tracing::info!(chat = ctx.chat_id(), "incoming");
//!     next.run().await
//! }));
//! dispatcher.handle_update(update).await;
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{Instrument, debug, debug_span, trace, warn};

use super::context::Context;
use super::event_bus::{EventBus, Payload};
use super::middleware::{Composed, Middleware, compose, noop_terminal};
use crate::foundation::{BoxError, EventKind, Update, UpdateBody};
use crate::integration::BotApi;

/// Routes updates through middleware and onto the event bus.
pub struct Dispatcher {
    bus: Arc<EventBus<Context>>,
    api: BotApi,
    middlewares: Mutex<Vec<Middleware<Context>>>,
    /// Recomposed on every `use_middleware`; dispatches clone it up front.
    chain: RwLock<Composed<Context>>,
}

impl Dispatcher {
    pub fn new(bus: Arc<EventBus<Context>>, api: BotApi) -> Self {
        Self {
            bus,
            api,
            middlewares: Mutex::new(Vec::new()),
            chain: RwLock::new(compose(Vec::new())),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus<Context>> {
        &self.bus
    }

    pub fn api(&self) -> &BotApi {
        &self.api
    }

    /// Appends a middleware. Dispatches already in flight keep their chain.
    pub fn use_middleware(&self, middleware: Middleware<Context>) {
        let mut middlewares = self.middlewares.lock();
        middlewares.push(middleware);
        *self.chain.write() = compose(middlewares.clone());
        debug!(count = middlewares.len(), "Middleware chain recomposed");
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.lock().len()
    }

    /// Events emitted for `update`, in emission order.
    pub fn events_for(update: &Update) -> Vec<EventKind> {
        let mut events = Vec::new();

        match &update.body {
            UpdateBody::NewMessage { new_message: m } => {
                let derived = [
                    (m.is_command(), EventKind::Command),
                    (m.contact_message.is_some(), EventKind::Contact),
                    (m.file.is_some(), EventKind::File),
                    (m.forwarded_from.is_some(), EventKind::ForwardedFrom),
                    (m.live_location.is_some(), EventKind::LiveLocation),
                    (m.location.is_some(), EventKind::Location),
                    (m.poll.is_some(), EventKind::Poll),
                    (m.sticker.is_some(), EventKind::Sticker),
                    (m.aux_data.is_some(), EventKind::Query),
                ];
                events.extend(derived.into_iter().filter_map(|(hit, kind)| hit.then_some(kind)));
                events.push(EventKind::NewMessage);
            }
            _ => events.extend(update.kind()),
        }

        events.push(EventKind::Update);
        events
    }

    /// Dispatches one update. Errors are reported, never returned.
    pub async fn handle_update(&self, update: Update) {
        let span = debug_span!("dispatch", chat_id = %update.chat_id, kind = ?update.kind());

        async move {
            if let Err(err) = self.dispatch(update).await {
                warn!(error = %err, "Update dispatch failed");
                self.bus.emit_error(err.as_ref());
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, update: Update) -> Result<(), BoxError> {
        let events = Self::events_for(&update);
        let ctx = Arc::new(Context::new(update, self.api.clone()));

        let chain = self.chain.read().clone();
        chain.run(Arc::clone(&ctx), noop_terminal()).await?;

        for kind in events {
            let completed = self
                .bus
                .emit_async(kind, Arc::clone(&ctx), Payload::new())
                .await?;
            if !completed {
                trace!(event = %kind, "Event cancelled by listener");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("middleware_count", &self.middleware_count())
            .field("bus", &self.bus)
            .finish()
    }
}
