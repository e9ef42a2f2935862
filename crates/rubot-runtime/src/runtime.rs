//! The bot client tying configuration, transport, dispatch and polling together.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rubot_runtime::Rubot;
//! use rubot_core::{EventKind, Listener};
//!
//! let bot = Rubot::new(std::env::var("RUBIKA_TOKEN")?)?;
//! bot.on(EventKind::Command, Listener::observer(|ctx| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! }))?;
//!
//! // Poll until Ctrl+C or SIGTERM.
//! bot.run().await?;
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,ignore
//! let bot = Rubot::builder()
//!     .config_file("config/rubot.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use rubot_core::{
    AfterListener, ApiResult, ApiTransport, BotApi, Context, Dispatcher, ErrorSink, EventBus,
    EventKind, Listener, ListenerId, Middleware, Update, UpdateEndpointType, UsageResult,
};
use rubot_transport::http::HttpTransport;

use crate::config::{ConfigLoader, RubotConfig, validate_config};
use crate::error::RuntimeResult;
use crate::fetcher::{FetcherSettings, UpdateCallback, UpdateFetcher, UpdateSource};
use crate::logging;

/// A Rubika bot.
///
/// Cloning is cheap; clones share listeners, middleware and polling state.
#[derive(Clone)]
pub struct Rubot {
    config: Arc<RubotConfig>,
    bus: Arc<EventBus<Context>>,
    dispatcher: Arc<Dispatcher>,
    fetcher: Arc<UpdateFetcher>,
}

impl Rubot {
    /// Creates a bot with default settings for `token`.
    pub fn new(token: impl Into<String>) -> RuntimeResult<Self> {
        let mut config = RubotConfig::default();
        config.bot.token = token.into();
        Self::from_config(&config)
    }

    pub fn builder() -> RubotBuilder {
        RubotBuilder::new()
    }

    /// Validates `config`, installs logging and connects over HTTPS.
    pub fn from_config(config: &RubotConfig) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        let transport = HttpTransport::new(
            config.bot.base_url.as_str(),
            config.bot.token.as_str(),
            config.bot.timeout(),
        )?;

        info!(
            base_url = %config.bot.base_url,
            freshness_window_secs = config.polling.freshness_window_secs,
            poll_interval_ms = config.polling.poll_interval_ms,
            "Bot initialized from configuration"
        );

        Ok(Self::with_transport(config.clone(), Arc::new(transport)))
    }

    /// Builds a bot over an arbitrary transport. No validation or logging
    /// setup is done.
    pub fn with_transport(config: RubotConfig, transport: Arc<dyn ApiTransport>) -> Self {
        let bus: Arc<EventBus<Context>> = Arc::new(EventBus::new());
        let errors: Arc<dyn ErrorSink> = bus.clone();
        let sink: Weak<dyn ErrorSink> = Arc::downgrade(&errors);

        let api = BotApi::new(transport).with_error_sink(sink);
        let source: Arc<dyn UpdateSource> = Arc::new(api.clone());
        let fetcher = UpdateFetcher::new(source, errors, FetcherSettings::from(&config.polling));
        let dispatcher = Dispatcher::new(Arc::clone(&bus), api);

        Self {
            config: Arc::new(config),
            bus,
            dispatcher: Arc::new(dispatcher),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn config(&self) -> &RubotConfig {
        &self.config
    }

    pub fn api(&self) -> &BotApi {
        self.dispatcher.api()
    }

    pub fn bus(&self) -> &Arc<EventBus<Context>> {
        &self.bus
    }

    pub fn fetcher(&self) -> &Arc<UpdateFetcher> {
        &self.fetcher
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Appends a middleware to the chain run before every update's events.
    pub fn use_middleware(&self, middleware: Middleware<Context>) {
        self.dispatcher.use_middleware(middleware);
    }

    pub fn on(&self, kind: EventKind, listener: Listener<Context>) -> UsageResult<ListenerId> {
        self.bus.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    pub fn on_before(
        &self,
        kind: EventKind,
        listener: Listener<Context>,
    ) -> UsageResult<ListenerId> {
        self.bus.on_before(kind, listener)
    }

    pub fn on_after(
        &self,
        kind: EventKind,
        listener: AfterListener<Context>,
    ) -> UsageResult<ListenerId> {
        self.bus.on_after(kind, listener)
    }

    pub fn install<F>(&self, kind: EventKind, installer: F) -> UsageResult<ListenerId>
    where
        F: FnOnce(&EventBus<Context>) -> Listener<Context>,
    {
        self.bus.install(kind, installer)
    }

    pub fn uninstall(&self, kind: EventKind) {
        self.bus.uninstall(kind);
    }

    pub fn uninstall_all(&self) {
        self.bus.uninstall_all();
    }

    /// Dispatches one update as if it had been received.
    pub async fn handle_update(&self, update: Update) {
        self.dispatcher.handle_update(update).await;
    }

    fn update_callback(&self) -> UpdateCallback {
        let dispatcher = Arc::clone(&self.dispatcher);
        Arc::new(move |update: Update| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.handle_update(update).await }.boxed()
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn is_running(&self) -> bool {
        self.fetcher.is_running()
    }

    /// Polls for updates until [`stop`](Self::stop). Returns at once if
    /// polling is already active.
    pub async fn launch(&self) {
        self.fetcher.run(&self.update_callback()).await;
    }

    /// Spawns [`launch`](Self::launch) on the current tokio runtime.
    pub fn start(&self) -> JoinHandle<()> {
        let bot = self.clone();
        tokio::spawn(async move { bot.launch().await })
    }

    /// Stops polling. The current fetch, if any, still completes.
    pub fn stop(&self) {
        self.fetcher.stop();
    }

    /// Stops polling and removes installed listeners.
    pub fn shutdown(&self) {
        self.stop();
        self.bus.uninstall_all();
        info!("Bot shut down");
    }

    /// Polls until Ctrl+C or SIGTERM, then shuts down.
    pub async fn run(&self) -> RuntimeResult<()> {
        let handle = self.start();
        info!("Bot is polling. Press Ctrl+C to stop.");

        let signal = wait_for_shutdown().await;
        self.shutdown();
        if let Err(e) = handle.await {
            error!(error = %e, "Polling task ended abnormally");
        }
        signal
    }

    /// Polls until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let handle = self.start();
        shutdown.await;
        self.shutdown();
        if let Err(e) = handle.await {
            error!(error = %e, "Polling task ended abnormally");
        }
    }

    // =========================================================================
    // Webhook
    // =========================================================================

    /// Points the `ReceiveUpdate` endpoint at `url`.
    pub async fn register_webhook(&self, url: &str) -> ApiResult<()> {
        self.api()
            .update_bot_endpoint(url, UpdateEndpointType::ReceiveUpdate)
            .await?;
        info!(url, "Webhook endpoint registered");
        Ok(())
    }

    /// Serves the configured webhook until Ctrl+C or SIGTERM.
    ///
    /// Registers `webhook.public_url` first when one is configured.
    #[cfg(feature = "http-server")]
    pub async fn run_webhook(&self) -> RuntimeResult<()> {
        self.serve_webhook(async {
            if let Err(e) = wait_for_shutdown().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serves the configured webhook until `shutdown` resolves.
    #[cfg(feature = "http-server")]
    pub async fn serve_webhook<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        use rubot_transport::http::WebhookServer;

        let webhook = &self.config.webhook;
        crate::config::validate_webhook(webhook)?;

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Update>(64);
        let handle = WebhookServer::new(webhook.addr(), &webhook.path)
            .listen(tx)
            .await?;

        if let Some(url) = &webhook.public_url {
            self.register_webhook(url).await?;
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                update = rx.recv() => match update {
                    Some(update) => self.handle_update(update).await,
                    None => {
                        tracing::warn!("Webhook channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => break,
            }
        }

        handle.shutdown().await;
        self.bus.uninstall_all();
        tracing::debug!("Webhook mode stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Rubot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rubot")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("fetcher", &self.fetcher)
            .finish()
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RubotBuilder
// =============================================================================

/// Builds a [`Rubot`] from layered configuration.
///
/// ```rust,ignore
/// let bot = Rubot::builder()
///     .search_path("/etc/rubot")
///     .token(token)
///     .build()?;
/// ```
pub struct RubotBuilder {
    loader: ConfigLoader,
    token: Option<String>,
}

impl Default for RubotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RubotBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            token: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    pub fn merge(mut self, config: RubotConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Overrides whatever token the configuration sources provide.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Loads the layered configuration without creating the bot.
    pub fn load_config(self) -> RuntimeResult<RubotConfig> {
        let mut config = self.loader.load()?;
        if let Some(token) = self.token {
            config.bot.token = token;
        }
        Ok(config)
    }

    /// Loads the configuration and creates the bot.
    pub fn build(self) -> RuntimeResult<Rubot> {
        let config = self.load_config()?;
        Rubot::from_config(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use rubot_core::{BoxError, TransportError, TransportResult, UploadFile};

    use crate::config::ConfigError;
    use crate::error::RuntimeError;

    #[derive(Default)]
    struct MockTransport {
        pages: Mutex<VecDeque<TransportResult<Value>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockTransport {
        fn with_pages(pages: impl IntoIterator<Item = TransportResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into_iter().collect()),
                ..Default::default()
            })
        }

        fn sent(&self, method: &str) -> Vec<Value> {
            self.calls
                .lock()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ApiTransport for MockTransport {
        async fn call(&self, method: &str, body: Value) -> TransportResult<Value> {
            self.calls.lock().push((method.to_string(), body));
            if method == "getUpdates" {
                return self
                    .pages
                    .lock()
                    .pop_front()
                    .unwrap_or_else(|| Ok(json!({ "status": "OK", "data": { "updates": [] } })));
            }
            Ok(json!({ "status": "OK", "data": { "message_id": "out-1" } }))
        }

        async fn upload(&self, _upload_url: &str, _file: UploadFile) -> TransportResult<Value> {
            Ok(json!({ "status": "OK", "data": { "file_id": "f" } }))
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn test_config() -> RubotConfig {
        let mut config = RubotConfig::default();
        config.bot.token = "token".into();
        config.polling.poll_interval_ms = 5;
        config
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_polled_command_gets_reply() {
        let page = json!({
            "status": "OK",
            "data": {
                "updates": [{
                    "type": "NewMessage",
                    "chat_id": "c1",
                    "new_message": { "message_id": "m1", "text": "/ping", "time": now().to_string() }
                }]
            }
        });
        let transport = MockTransport::with_pages([Ok(page)]);
        let bot = Rubot::with_transport(test_config(), transport.clone());

        bot.on(
            EventKind::Command,
            Listener::observer(|ctx: Arc<Context>| async move {
                if ctx.command().is_some_and(|c| c.name == "ping") {
                    ctx.reply("pong").await?;
                }
                Ok::<(), BoxError>(())
            }),
        )
        .unwrap();

        let handle = bot.start();
        wait_until(|| !transport.sent("sendMessage").is_empty()).await;
        bot.stop();
        handle.await.unwrap();

        let sent = transport.sent("sendMessage");
        assert_eq!(
            sent[0],
            json!({ "chat_id": "c1", "text": "pong", "reply_to_message_id": "m1" })
        );
        assert!(!bot.is_running());
    }

    #[tokio::test]
    async fn test_poll_failures_reach_error_listener() {
        let transport = MockTransport::with_pages([Err(TransportError::Timeout {
            method: "getUpdates".into(),
        })]);
        let bot = Rubot::with_transport(test_config(), transport);

        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        bot.on(
            EventKind::Error,
            Listener::error(move |err, _span| {
                if err.downcast_ref::<rubot_core::ApiError>().is_some() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .unwrap();

        let handle = bot.start();
        wait_until(|| errors.load(Ordering::SeqCst) == 1).await;
        bot.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_removes_listeners() {
        let bot = Rubot::with_transport(test_config(), MockTransport::with_pages([]));
        bot.on(EventKind::Update, Listener::observer_sync(|_| Ok(())))
            .unwrap();
        bot.on_before(EventKind::NewMessage, Listener::gated_sync(|_, next| Ok(next.proceed())))
            .unwrap();
        assert!(!bot.bus().is_empty());

        bot.shutdown();

        assert!(bot.bus().is_empty());
    }

    #[tokio::test]
    async fn test_register_webhook() {
        let transport = MockTransport::with_pages([]);
        let bot = Rubot::with_transport(test_config(), transport.clone());

        bot.register_webhook("https://bot.example.org/rubika")
            .await
            .unwrap();

        assert_eq!(
            transport.sent("updateBotEndpoints"),
            vec![json!({ "url": "https://bot.example.org/rubika", "type": "ReceiveUpdate" })]
        );
    }

    #[test]
    fn test_from_config_requires_token() {
        let err = Rubot::from_config(&RubotConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Config(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_builder_token_override() {
        let config = Rubot::builder()
            .without_env()
            .search_path("/nonexistent/rubot-config")
            .token("from-builder")
            .load_config()
            .unwrap();
        assert_eq!(config.bot.token, "from-builder");
    }
}
