//! Phased, cancellable event bus.
//!
//! # Phases
//!
//! Every emission runs three ordered phases for one [`EventKind`]:
//!
//! ```text
//! before ──▶ main ──▶ after
//!   │          │
//!   └─ Stop ───┴──▶ emission ends, after phase skipped
//! ```
//!
//! Listeners in `before` and `main` may gate the emission. Listeners in
//! `after` never gate; in async mode a failing after-listener is reported
//! through the error event and its siblings still run.
//!
//! # Listener roles
//!
//! The role of a listener is chosen by its constructor:
//!
//! | Constructor | Receives | Gates |
//! |-------------|----------|-------|
//! | [`Listener::observer`] | context | no |
//! | [`Listener::gated`] | context, [`Next`] | yes |
//! | [`Listener::gated_with_payload`] | context, [`Payload`], [`Next`] | yes |
//! | [`Listener::error`] | error, span | only on [`EventKind::Error`] |
//!
//! A gated listener continues the chain by returning `next.proceed()`.
//! Returning [`Flow::Stop`] (or anything that is not the value produced by
//! `proceed`) cancels the rest of the emission. `Next` cannot be forged, so
//! the only way to continue is to consume it.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = EventBus::<Context>::new();
//!
//! bus.on_before(EventKind::NewMessage, Listener::gated_sync(|ctx, next| {
//!     if ctx.text().is_empty() {
//!         return Ok(Flow::Stop);
//!     }
//!     Ok(next.proceed())
//! }))?;
//!
//! bus.on(EventKind::NewMessage, Listener::observer(|ctx| async move {
//!     ctx.reply("hello").await?;
//!     Ok(())
//! }))?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{Span, debug, trace, warn};

use crate::foundation::{BoxError, ErrorSink, EventKind, UsageError, UsageResult};

type ListenerFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

type ObserverFn<C> = Arc<dyn Fn(Arc<C>) -> ListenerFuture<()> + Send + Sync>;
type GatedFn<C> = Arc<dyn Fn(Arc<C>, Next) -> ListenerFuture<Flow> + Send + Sync>;
type GatedPayloadFn<C> = Arc<dyn Fn(Arc<C>, Payload, Next) -> ListenerFuture<Flow> + Send + Sync>;
type PayloadObserverFn<C> = Arc<dyn Fn(Arc<C>, Payload) -> ListenerFuture<()> + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&(dyn std::error::Error + Send + Sync + 'static), &Span) + Send + Sync>;

// =============================================================================
// Continuation protocol
// =============================================================================

/// Proof that a gated listener called [`Next::proceed`].
#[derive(Debug, PartialEq, Eq)]
pub struct Proceed(());

/// Outcome of a gated listener.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep going. Only obtainable through [`Next::proceed`].
    Continue(Proceed),
    /// Cancel the rest of this emission.
    Stop,
}

impl Flow {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Continuation handed to gated listeners.
#[derive(Debug)]
pub struct Next(());

impl Next {
    fn new() -> Self {
        Self(())
    }

    /// Lets the emission continue with the next listener.
    pub fn proceed(self) -> Flow {
        Flow::Continue(Proceed(()))
    }
}

/// Mutable JSON object shared by every listener of one emission.
#[derive(Clone, Default)]
pub struct Payload(Arc<Mutex<Map<String, Value>>>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.lock().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.lock().contains_key(key)
    }

    /// Runs `f` with exclusive access to the underlying map.
    pub fn with<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.lock().clone()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(Arc::new(Mutex::new(map)))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&*self.0.lock()).finish()
    }
}

// =============================================================================
// Listeners
// =============================================================================

/// Identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

enum ListenerBody<C> {
    Observer(ObserverFn<C>),
    Gated(GatedFn<C>),
    GatedPayload(GatedPayloadFn<C>),
    Error(ErrorFn),
}

impl<C> Clone for ListenerBody<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Observer(f) => Self::Observer(Arc::clone(f)),
            Self::Gated(f) => Self::Gated(Arc::clone(f)),
            Self::GatedPayload(f) => Self::GatedPayload(Arc::clone(f)),
            Self::Error(f) => Self::Error(Arc::clone(f)),
        }
    }
}

/// A before- or main-phase listener.
///
/// Cloning keeps the identity, so registering a clone twice is a no-op.
pub struct Listener<C> {
    id: ListenerId,
    is_async: bool,
    body: ListenerBody<C>,
}

impl<C> Clone for Listener<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            is_async: self.is_async,
            body: self.body.clone(),
        }
    }
}

impl<C> fmt::Debug for Listener<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("role", &self.role())
            .field("is_async", &self.is_async)
            .finish()
    }
}

impl<C: Send + Sync + 'static> Listener<C> {
    fn build(is_async: bool, body: ListenerBody<C>) -> Self {
        Self {
            id: ListenerId::next(),
            is_async,
            body,
        }
    }

    /// Async observer. Never gates.
    pub fn observer<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::build(
            true,
            ListenerBody::Observer(Arc::new(move |ctx: Arc<C>| f(ctx).boxed())),
        )
    }

    /// Synchronous observer. Never gates.
    pub fn observer_sync<F>(f: F) -> Self
    where
        F: Fn(&C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::build(
            false,
            ListenerBody::Observer(Arc::new(move |ctx: Arc<C>| future::ready(f(&ctx)).boxed())),
        )
    }

    /// Async gated listener.
    pub fn gated<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        Self::build(
            true,
            ListenerBody::Gated(Arc::new(move |ctx: Arc<C>, next: Next| f(ctx, next).boxed())),
        )
    }

    /// Synchronous gated listener.
    pub fn gated_sync<F>(f: F) -> Self
    where
        F: Fn(&C, Next) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        Self::build(
            false,
            ListenerBody::Gated(Arc::new(move |ctx: Arc<C>, next: Next| {
                future::ready(f(&ctx, next)).boxed()
            })),
        )
    }

    /// Async gated listener that also receives the emission payload.
    pub fn gated_with_payload<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>, Payload, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
    {
        Self::build(
            true,
            ListenerBody::GatedPayload(Arc::new(
                move |ctx: Arc<C>, payload: Payload, next: Next| f(ctx, payload, next).boxed(),
            )),
        )
    }

    /// Synchronous gated listener that also receives the emission payload.
    pub fn gated_with_payload_sync<F>(f: F) -> Self
    where
        F: Fn(&C, &Payload, Next) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        Self::build(
            false,
            ListenerBody::GatedPayload(Arc::new(
                move |ctx: Arc<C>, payload: Payload, next: Next| {
                    future::ready(f(&ctx, &payload, next)).boxed()
                },
            )),
        )
    }

    /// Listener for [`EventKind::Error`]. Always synchronous.
    pub fn error<F>(f: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + Send + Sync + 'static), &Span) + Send + Sync + 'static,
    {
        Self::build(false, ListenerBody::Error(Arc::new(f)))
    }
}

impl<C> Listener<C> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    fn role(&self) -> &'static str {
        match self.body {
            ListenerBody::Observer(_) => "observer",
            ListenerBody::Gated(_) | ListenerBody::GatedPayload(_) => "gated",
            ListenerBody::Error(_) => "error",
        }
    }

    /// Invokes the listener; resolves to `true` if the chain may continue.
    fn call(&self, ctx: &Arc<C>, payload: &Payload) -> ListenerFuture<bool> {
        match &self.body {
            ListenerBody::Observer(f) => f(Arc::clone(ctx)).map(|r| r.map(|()| true)).boxed(),
            ListenerBody::Gated(f) => f(Arc::clone(ctx), Next::new())
                .map(|r| r.map(|flow| flow.is_continue()))
                .boxed(),
            ListenerBody::GatedPayload(f) => f(Arc::clone(ctx), payload.clone(), Next::new())
                .map(|r| r.map(|flow| flow.is_continue()))
                .boxed(),
            ListenerBody::Error(_) => future::ready(Ok(true)).boxed(),
        }
    }
}

enum AfterBody<C> {
    Plain(ObserverFn<C>),
    WithPayload(PayloadObserverFn<C>),
}

/// An after-phase listener. Runs once the before and main phases completed.
pub struct AfterListener<C> {
    id: ListenerId,
    body: AfterBody<C>,
}

impl<C> Clone for AfterListener<C> {
    fn clone(&self) -> Self {
        let body = match &self.body {
            AfterBody::Plain(f) => AfterBody::Plain(Arc::clone(f)),
            AfterBody::WithPayload(f) => AfterBody::WithPayload(Arc::clone(f)),
        };
        Self { id: self.id, body }
    }
}

impl<C> fmt::Debug for AfterListener<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterListener")
            .field("id", &self.id)
            .field("with_payload", &matches!(self.body, AfterBody::WithPayload(_)))
            .finish()
    }
}

impl<C: Send + Sync + 'static> AfterListener<C> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            id: ListenerId::next(),
            body: AfterBody::Plain(Arc::new(move |ctx: Arc<C>| f(ctx).boxed())),
        }
    }

    pub fn new_sync<F>(f: F) -> Self
    where
        F: Fn(&C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::next(),
            body: AfterBody::Plain(Arc::new(move |ctx: Arc<C>| future::ready(f(&ctx)).boxed())),
        }
    }

    /// After-listener that receives the payload accumulated by earlier phases.
    pub fn with_payload<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<C>, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            id: ListenerId::next(),
            body: AfterBody::WithPayload(Arc::new(move |ctx: Arc<C>, payload: Payload| {
                f(ctx, payload).boxed()
            })),
        }
    }

    pub fn with_payload_sync<F>(f: F) -> Self
    where
        F: Fn(&C, &Payload) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            id: ListenerId::next(),
            body: AfterBody::WithPayload(Arc::new(move |ctx: Arc<C>, payload: Payload| {
                future::ready(f(&ctx, &payload)).boxed()
            })),
        }
    }
}

impl<C> AfterListener<C> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    fn call(&self, ctx: &Arc<C>, payload: &Payload) -> ListenerFuture<()> {
        match &self.body {
            AfterBody::Plain(f) => f(Arc::clone(ctx)),
            AfterBody::WithPayload(f) => f(Arc::clone(ctx), payload.clone()),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

struct Registry<C> {
    main: HashMap<EventKind, Vec<Listener<C>>>,
    before: HashMap<EventKind, Vec<Listener<C>>>,
    after: HashMap<EventKind, Vec<AfterListener<C>>>,
    installed: HashMap<EventKind, Vec<ListenerId>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            main: HashMap::new(),
            before: HashMap::new(),
            after: HashMap::new(),
            installed: HashMap::new(),
        }
    }
}

// =============================================================================
// EventBus
// =============================================================================

/// Typed publish/subscribe registry with before/main/after phases.
///
/// `C` is the context handed to every listener. Registration takes `&self`,
/// and the registry lock is never held while a listener runs, so listeners
/// may register or remove other listeners.
pub struct EventBus<C> {
    registry: RwLock<Registry<C>>,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("EventBus")
            .field("main", &registry.main.values().map(Vec::len).sum::<usize>())
            .field("before", &registry.before.values().map(Vec::len).sum::<usize>())
            .field("after", &registry.after.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl<C: Send + Sync + 'static> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers `listener` in the main phase of `kind`.
    ///
    /// The error event only accepts [`Listener::error`]; any async listener
    /// there fails with [`UsageError::AsyncErrorListener`].
    pub fn on(&self, kind: EventKind, listener: Listener<C>) -> UsageResult<ListenerId> {
        check_main(kind, &listener)?;
        let id = listener.id;

        let mut guard = self.registry.write();
        let registry = &mut *guard;
        let main = registry.main.entry(kind).or_default();
        if !main.iter().any(|l| l.id == id) {
            main.push(listener);
        }
        let installed = registry.installed.entry(kind).or_default();
        if !installed.contains(&id) {
            installed.push(id);
        }

        trace!(event = %kind, listener = ?id, "Listener registered");
        Ok(id)
    }

    /// Removes one main-phase listener. Returns whether it was registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        if let Some(installed) = registry.installed.get_mut(&kind) {
            installed.retain(|l| *l != id);
        }
        let Some(main) = registry.main.get_mut(&kind) else {
            return false;
        };
        let before = main.len();
        main.retain(|l| l.id != id);
        let removed = main.len() != before;
        if main.is_empty() {
            registry.main.remove(&kind);
        }
        removed
    }

    /// Registers `listener` in the before phase of `kind`.
    pub fn on_before(&self, kind: EventKind, listener: Listener<C>) -> UsageResult<ListenerId> {
        if kind.is_error() {
            return Err(UsageError::ErrorEventPhase);
        }
        if matches!(listener.body, ListenerBody::Error(_)) {
            return Err(UsageError::ListenerMismatch {
                kind,
                listener: listener.role(),
            });
        }

        let id = listener.id;
        let mut registry = self.registry.write();
        let before = registry.before.entry(kind).or_default();
        if !before.iter().any(|l| l.id == id) {
            before.push(listener);
        }
        Ok(id)
    }

    /// Registers `listener` in the after phase of `kind`.
    pub fn on_after(&self, kind: EventKind, listener: AfterListener<C>) -> UsageResult<ListenerId> {
        if kind.is_error() {
            return Err(UsageError::ErrorEventPhase);
        }

        let id = listener.id;
        let mut registry = self.registry.write();
        let after = registry.after.entry(kind).or_default();
        if !after.iter().any(|l| l.id == id) {
            after.push(listener);
        }
        Ok(id)
    }

    /// Builds a listener with `installer` and registers it with [`on`](Self::on).
    pub fn install<F>(&self, kind: EventKind, installer: F) -> UsageResult<ListenerId>
    where
        F: FnOnce(&Self) -> Listener<C>,
    {
        let listener = installer(self);
        self.on(kind, listener)
    }

    /// Removes every installed listener of `kind` from the main phase.
    pub fn uninstall(&self, kind: EventKind) {
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        let Some(ids) = registry.installed.remove(&kind) else {
            return;
        };
        let now_empty = match registry.main.get_mut(&kind) {
            Some(main) => {
                main.retain(|l| !ids.contains(&l.id));
                main.is_empty()
            }
            None => false,
        };
        if now_empty {
            registry.main.remove(&kind);
        }
        debug!(event = %kind, count = ids.len(), "Uninstalled listeners");
    }

    /// Removes every installed listener and clears the before/after phases.
    pub fn uninstall_all(&self) {
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        for (kind, ids) in registry.installed.drain() {
            if let Some(main) = registry.main.get_mut(&kind) {
                main.retain(|l| !ids.contains(&l.id));
            }
        }
        registry.main.retain(|_, listeners| !listeners.is_empty());
        registry.before.clear();
        registry.after.clear();
        debug!("Uninstalled all listeners");
    }

    /// No main listener for any kind and no before/after listener at all.
    pub fn is_empty(&self) -> bool {
        let registry = self.registry.read();
        registry.main.values().all(Vec::is_empty)
            && registry.before.values().all(Vec::is_empty)
            && registry.after.values().all(Vec::is_empty)
    }

    /// Number of main-phase listeners for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry.read().main.get(&kind).map_or(0, Vec::len)
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn snapshot_main(&self, kind: EventKind) -> Vec<Listener<C>> {
        self.registry
            .read()
            .main
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn snapshot_before(&self, kind: EventKind) -> Vec<Listener<C>> {
        self.registry
            .read()
            .before
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    fn snapshot_after(&self, kind: EventKind) -> Vec<AfterListener<C>> {
        self.registry
            .read()
            .after
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Emits `kind`, awaiting each listener in registration order.
    ///
    /// Returns `Ok(false)` if a before- or main-phase listener cancelled the
    /// emission. Errors from those phases propagate; after-phase errors go to
    /// the error event.
    pub async fn emit_async(
        &self,
        kind: EventKind,
        ctx: Arc<C>,
        payload: Payload,
    ) -> Result<bool, BoxError> {
        if kind.is_error() {
            return Err(UsageError::ReservedEvent.into());
        }
        trace!(event = %kind, "Emitting event");

        for phase in ["before", "main"] {
            // Taken per phase so main listeners added during `before` see this emission.
            let listeners = match phase {
                "before" => self.snapshot_before(kind),
                _ => self.snapshot_main(kind),
            };
            for listener in &listeners {
                if !listener.call(&ctx, &payload).await? {
                    debug!(event = %kind, phase, listener = ?listener.id, "Emission cancelled");
                    return Ok(false);
                }
            }
        }

        for listener in self.snapshot_after(kind) {
            if let Err(err) = listener.call(&ctx, &payload).await {
                warn!(event = %kind, listener = ?listener.id, error = %err, "After listener failed");
                self.emit_error(err.as_ref());
            }
        }
        Ok(true)
    }

    /// Emits `kind` without awaiting.
    ///
    /// Each listener is polled once. A before- or main-phase listener that is
    /// still pending cancels the emission; the pending work is detached onto
    /// the current tokio runtime if there is one. Pending after-listeners are
    /// detached the same way.
    pub fn emit_sync(&self, kind: EventKind, ctx: Arc<C>, payload: Payload) -> Result<bool, BoxError> {
        if kind.is_error() {
            return Err(UsageError::ReservedEvent.into());
        }
        trace!(event = %kind, "Emitting event synchronously");

        for phase in ["before", "main"] {
            // Taken per phase so main listeners added during `before` see this emission.
            let listeners = match phase {
                "before" => self.snapshot_before(kind),
                _ => self.snapshot_main(kind),
            };
            for listener in &listeners {
                let mut fut = listener.call(&ctx, &payload);
                match (&mut fut).now_or_never() {
                    Some(Ok(true)) => {}
                    Some(Ok(false)) => {
                        debug!(event = %kind, phase, listener = ?listener.id, "Emission cancelled");
                        return Ok(false);
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        debug!(event = %kind, phase, listener = ?listener.id, "Listener pending in synchronous emission, cancelling");
                        detach(kind, fut);
                        return Ok(false);
                    }
                }
            }
        }

        for listener in self.snapshot_after(kind) {
            let mut fut = listener.call(&ctx, &payload);
            match (&mut fut).now_or_never() {
                Some(Ok(())) => {}
                Some(Err(err)) => return Err(err),
                None => detach(kind, fut),
            }
        }
        Ok(true)
    }

    /// Delivers `err` to every error listener, synchronously.
    pub fn emit_error(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        let listeners = self.snapshot_main(EventKind::Error);
        if listeners.is_empty() {
            debug!(error = %err, "Error event has no listeners");
            return;
        }

        let span = Span::current();
        for listener in &listeners {
            if let ListenerBody::Error(f) = &listener.body {
                f(err, &span);
            }
        }
    }
}

impl<C: Send + Sync + 'static> ErrorSink for EventBus<C> {
    fn report(&self, err: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.emit_error(err);
    }
}

fn check_main<C>(kind: EventKind, listener: &Listener<C>) -> UsageResult<()> {
    let is_error_body = matches!(listener.body, ListenerBody::Error(_));
    match (kind.is_error(), is_error_body) {
        (true, _) if listener.is_async => Err(UsageError::AsyncErrorListener),
        (true, true) | (false, false) => Ok(()),
        _ => Err(UsageError::ListenerMismatch {
            kind,
            listener: listener.role(),
        }),
    }
}

fn detach<T: Send + 'static>(kind: EventKind, fut: ListenerFuture<T>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = fut.await {
                    warn!(event = %kind, error = %err, "Detached listener failed");
                }
            });
        }
        Err(_) => debug!(event = %kind, "No runtime to finish pending listener, dropping it"),
    }
}
