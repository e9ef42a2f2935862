//! Long-polling update fetcher.
//!
//! The [`UpdateFetcher`] pulls pages of updates with `getUpdates`, drops the
//! ones it has already delivered or that are too old, and hands the rest to
//! a callback one at a time. The callback is awaited before the next update
//! is looked at, so dispatch order always matches server order.
//!
//! Two filters apply to new and updated messages:
//!
//! - **Duplicates**: a message whose time is not past the watermark (the
//!   largest time delivered so far) is skipped.
//! - **Freshness**: a message older than the freshness window is skipped
//!   and does not move the watermark.
//!
//! A new or updated message without a time is treated as one second past
//! the watermark. Updates that carry no timed message (removals, payments,
//! bot start/stop) bypass both filters.
//!
//! ```rust,ignore
//! let fetcher = UpdateFetcher::new(source, errors, FetcherSettings::from(&config.polling));
//! fetcher.run(&callback).await; // until fetcher.stop()
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use rubot_core::{ApiError, ApiResult, BotApi, ErrorSink, Update, UpdateBatch};

use crate::config::PollingConfig;

/// Receives each accepted update.
pub type UpdateCallback = Arc<dyn Fn(Update) -> BoxFuture<'static, ()> + Send + Sync>;

/// Where pages of updates come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch(&self, cursor: Option<&str>, limit: Option<u32>) -> ApiResult<UpdateBatch>;
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn fetch(&self, cursor: Option<&str>, limit: Option<u32>) -> ApiResult<UpdateBatch> {
        // The fetcher reports failures itself.
        self.poll_updates(cursor, limit).await
    }
}

/// Wall clock in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherSettings {
    /// Maximum message age in seconds.
    pub freshness_window_secs: u64,
    /// Sleep after catching up or after a failed fetch.
    pub poll_interval: Duration,
    pub limit: Option<u32>,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for FetcherSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            freshness_window_secs: config.freshness_window_secs,
            poll_interval: config.poll_interval(),
            limit: config.limit,
        }
    }
}

#[derive(Debug, Default)]
struct PollState {
    cursor: Option<String>,
    watermark: u64,
}

/// Time used for duplicate and freshness checks, or `None` when the update
/// is not subject to them.
pub fn effective_time(update: &Update, watermark: u64) -> Option<u64> {
    update
        .timed_message()
        .map(|m| m.time.unwrap_or(watermark.saturating_add(1)))
}

/// Polls an [`UpdateSource`] until stopped.
pub struct UpdateFetcher {
    source: Arc<dyn UpdateSource>,
    clock: Arc<dyn Clock>,
    errors: Arc<dyn ErrorSink>,
    settings: FetcherSettings,
    running: AtomicBool,
    /// Bumped by every `stop`; a loop exits once it no longer matches.
    stops: AtomicU64,
    /// Held by the active poll loop.
    active: tokio::sync::Mutex<()>,
    caught_up: AtomicBool,
    state: Mutex<PollState>,
    /// Cancelled by `stop` to cut a sleep short.
    wake: Mutex<CancellationToken>,
}

impl UpdateFetcher {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        errors: Arc<dyn ErrorSink>,
        settings: FetcherSettings,
    ) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            errors,
            settings,
            running: AtomicBool::new(false),
            stops: AtomicU64::new(0),
            active: tokio::sync::Mutex::new(()),
            caught_up: AtomicBool::new(false),
            state: Mutex::new(PollState::default()),
            wake: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resumes from a previously observed cursor and watermark.
    pub fn resume_from(self, cursor: Option<String>, watermark: u64) -> Self {
        *self.state.lock() = PollState { cursor, watermark };
        self
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Largest message time delivered so far.
    pub fn watermark(&self) -> u64 {
        self.state.lock().watermark
    }

    /// Cursor sent with the next fetch.
    pub fn cursor(&self) -> Option<String> {
        self.state.lock().cursor.clone()
    }

    /// Polls until [`stop`](Self::stop) is called.
    ///
    /// Returns immediately if another call is already polling. A fetch in
    /// flight when `stop` is called completes and its updates are still
    /// delivered; a `run` issued meanwhile waits for that loop to exit
    /// before it polls.
    pub async fn run(&self, on_update: &UpdateCallback) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Update fetcher already running");
            return;
        }
        let generation = self.stops.load(Ordering::SeqCst);

        let _active = self.active.lock().await;
        let wake = {
            let mut token = self.wake.lock();
            *token = CancellationToken::new();
            token.clone()
        };
        if !self.is_current(generation) {
            debug!("Update fetcher stopped before polling");
            return;
        }
        info!(
            window_secs = self.settings.freshness_window_secs,
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Update fetcher started"
        );

        while self.is_current(generation) {
            let cursor = self.cursor();
            match self.source.fetch(cursor.as_deref(), self.settings.limit).await {
                Ok(batch) => {
                    let caught_up = self.process_batch(batch, on_update).await;
                    if caught_up {
                        if !self.caught_up.swap(true, Ordering::SeqCst) {
                            info!("Caught up with pending updates");
                        }
                        self.pause(&wake).await;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Fetching updates failed");
                    self.errors.report(&err);
                    self.pause(&wake).await;
                }
            }
        }

        info!("Update fetcher stopped");
    }

    /// Requests the poll loop to exit and interrupts its sleep.
    pub fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Stopping update fetcher");
        }
        self.wake.lock().cancel();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.stops.load(Ordering::SeqCst) == generation
    }

    async fn pause(&self, wake: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.poll_interval) => {}
            _ = wake.cancelled() => {}
        }
    }

    /// Filters and delivers one page. Returns `true` when the server sent no
    /// further cursor.
    pub(crate) async fn process_batch(&self, batch: UpdateBatch, on_update: &UpdateCallback) -> bool {
        let UpdateBatch {
            updates,
            next_offset_id,
            rejected,
        } = batch;
        trace!(count = updates.len(), "Received update page");

        for entry in rejected {
            warn!(reason = %entry.reason, "Skipping undecodable update");
            self.errors
                .report(&ApiError::serialization("getUpdates", entry.reason));
        }

        for update in updates {
            if self.admit(&update) {
                on_update(update).await;
            }
        }

        match next_offset_id {
            Some(next) => {
                self.state.lock().cursor = Some(next);
                false
            }
            None => true,
        }
    }

    /// Applies the duplicate and freshness filters, advancing the watermark
    /// for accepted messages.
    fn admit(&self, update: &Update) -> bool {
        let mut state = self.state.lock();
        let Some(time) = effective_time(update, state.watermark) else {
            return true;
        };

        if time <= state.watermark {
            trace!(chat_id = %update.chat_id, time, watermark = state.watermark, "Skipping already delivered update");
            return false;
        }

        let age = self.clock.now_secs().saturating_sub(time);
        if age > self.settings.freshness_window_secs {
            debug!(chat_id = %update.chat_id, age, "Skipping stale update");
            return false;
        }

        state.watermark = state.watermark.max(time);
        true
    }
}

impl fmt::Debug for UpdateFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UpdateFetcher")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .field("cursor", &state.cursor)
            .field("watermark", &state.watermark)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use futures::FutureExt;
    use rubot_core::{ApiError, Message, TransportError, UpdateBody};

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_secs(&self) -> u64 {
            self.0
        }
    }

    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<ApiResult<UpdateBatch>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn with(pages: impl IntoIterator<Item = ApiResult<UpdateBatch>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into_iter().collect()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn fetch(&self, cursor: Option<&str>, _limit: Option<u32>) -> ApiResult<UpdateBatch> {
            self.cursors.lock().push(cursor.map(str::to_string));
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(UpdateBatch::default()))
        }
    }

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    impl ErrorSink for CountingSink {
        fn report(&self, _err: &(dyn std::error::Error + Send + Sync + 'static)) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn message(id: &str, time: Option<u64>) -> Update {
        Update::new(
            "chat",
            UpdateBody::NewMessage {
                new_message: Message {
                    message_id: id.into(),
                    time,
                    ..Default::default()
                },
            },
        )
    }

    fn batch(updates: Vec<Update>, next: Option<&str>) -> UpdateBatch {
        UpdateBatch::new(updates, next.map(str::to_string))
    }

    fn fetcher(source: Arc<ScriptedSource>, now: u64, window: u64) -> UpdateFetcher {
        let settings = FetcherSettings {
            freshness_window_secs: window,
            poll_interval: Duration::from_millis(5),
            limit: None,
        };
        UpdateFetcher::new(source, Arc::new(CountingSink::default()), settings)
            .with_clock(Arc::new(FixedClock(now)))
    }

    fn recorder() -> (UpdateCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: UpdateCallback = Arc::new(move |update: Update| {
            let id = update
                .message()
                .map(|m| m.message_id.clone())
                .unwrap_or_else(|| update.chat_id.clone());
            sink.lock().push(id);
            async {}.boxed()
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn test_out_of_order_batch_drops_older_message() {
        let fetcher = fetcher(ScriptedSource::with([]), 110, 100).resume_from(None, 9);
        let (callback, seen) = recorder();

        let page = batch(
            vec![
                message("a", Some(10)),
                message("b", Some(8)),
                message("c", Some(12)),
            ],
            None,
        );
        let caught_up = fetcher.process_batch(page, &callback).await;

        assert!(caught_up);
        assert_eq!(*seen.lock(), vec!["a", "c"]);
        assert_eq!(fetcher.watermark(), 12);
    }

    #[tokio::test]
    async fn test_duplicates_suppressed_across_pages() {
        let fetcher = fetcher(ScriptedSource::with([]), 1000, 100);
        let (callback, seen) = recorder();

        fetcher
            .process_batch(batch(vec![message("a", Some(950))], Some("p2")), &callback)
            .await;
        fetcher
            .process_batch(batch(vec![message("a", Some(950))], Some("p3")), &callback)
            .await;

        assert_eq!(*seen.lock(), vec!["a"]);
        assert_eq!(fetcher.cursor().as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn test_stale_message_skipped_without_advancing_watermark() {
        let fetcher = fetcher(ScriptedSource::with([]), 1000, 5);
        let (callback, seen) = recorder();

        fetcher
            .process_batch(
                batch(vec![message("old", Some(900)), message("new", Some(998))], None),
                &callback,
            )
            .await;

        assert_eq!(*seen.lock(), vec!["new"]);
        assert_eq!(fetcher.watermark(), 998);
    }

    #[tokio::test]
    async fn test_untimed_updates() {
        let fetcher = fetcher(ScriptedSource::with([]), 50, 5).resume_from(None, 48);
        let (callback, seen) = recorder();

        let removed = Update::new(
            "removed",
            UpdateBody::RemovedMessage {
                removed_message_id: "7".into(),
            },
        );
        fetcher
            .process_batch(batch(vec![message("no-time", None), removed], None), &callback)
            .await;

        assert_eq!(*seen.lock(), vec!["no-time", "removed"]);
        assert_eq!(fetcher.watermark(), 49);
        assert_eq!(effective_time(&message("x", None), 49), Some(50));
        assert_eq!(
            effective_time(&Update::new("c", UpdateBody::StartedBot { new_message: None }), 49),
            None
        );
    }

    #[test]
    fn test_cursor_kept_when_page_has_no_next() {
        let fetcher = fetcher(ScriptedSource::with([]), 0, 5).resume_from(Some("p1".into()), 0);
        let (callback, _) = recorder();

        let caught_up = tokio_test::block_on(fetcher.process_batch(batch(vec![], None), &callback));

        assert!(caught_up);
        assert_eq!(fetcher.cursor().as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_reported_and_page_consumed() {
        let sink = Arc::new(CountingSink::default());
        let fetcher = UpdateFetcher::new(
            ScriptedSource::with([]),
            sink.clone(),
            FetcherSettings::default(),
        )
        .with_clock(Arc::new(FixedClock(100)));
        let (callback, seen) = recorder();

        let page: UpdateBatch = serde_json::from_value(serde_json::json!({
            "updates": [
                { "type": "NewMessage", "chat_id": "c",
                  "new_message": { "message_id": "a", "time": 100 } },
                { "type": "UpdatedPayment", "chat_id": "c",
                  "updated_payment": { "payment_id": "p", "status": "Refunded" } }
            ],
            "next_offset_id": "p2"
        }))
        .unwrap();
        let caught_up = fetcher.process_batch(page, &callback).await;

        assert!(!caught_up);
        assert_eq!(*seen.lock(), vec!["a"]);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.cursor().as_deref(), Some("p2"));
    }

    #[test]
    fn test_untimed_message_at_max_watermark() {
        assert_eq!(effective_time(&message("x", None), u64::MAX), Some(u64::MAX));

        let fetcher = fetcher(ScriptedSource::with([]), 0, 5).resume_from(None, u64::MAX);
        let (callback, seen) = recorder();
        let page = batch(vec![message("x", None)], None);
        tokio_test::block_on(fetcher.process_batch(page, &callback));

        assert!(seen.lock().is_empty());
        assert_eq!(fetcher.watermark(), u64::MAX);
    }

    /// Fetches slowly and records how many fetches overlap.
    #[derive(Default)]
    struct SlowSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl UpdateSource for SlowSource {
        async fn fetch(&self, _cursor: Option<&str>, _limit: Option<u32>) -> ApiResult<UpdateBatch> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(UpdateBatch::default())
        }
    }

    #[tokio::test]
    async fn test_restart_after_stop_waits_for_previous_loop() {
        let source = Arc::new(SlowSource::default());
        let settings = FetcherSettings {
            freshness_window_secs: 10,
            poll_interval: Duration::from_millis(5),
            limit: None,
        };
        let fetcher = Arc::new(UpdateFetcher::new(
            source.clone(),
            Arc::new(CountingSink::default()),
            settings,
        ));
        let (callback, _) = recorder();
        let spawn_run = || {
            let fetcher = Arc::clone(&fetcher);
            let callback = Arc::clone(&callback);
            tokio::spawn(async move { fetcher.run(&callback).await })
        };

        let first = spawn_run();
        tokio::time::sleep(Duration::from_millis(20)).await;
        fetcher.stop();
        let second = spawn_run();

        tokio::time::timeout(Duration::from_secs(5), async {
            while source.fetches.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(fetcher.is_running());

        fetcher.stop();
        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!fetcher.is_running());
    }

    #[tokio::test]
    async fn test_run_reports_errors_and_stops() {
        let source = ScriptedSource::with([
            Err(ApiError::Transport(TransportError::Timeout {
                method: "getUpdates".into(),
            })),
            Ok(batch(vec![message("a", Some(100))], Some("next"))),
        ]);
        let sink = Arc::new(CountingSink::default());
        let settings = FetcherSettings {
            freshness_window_secs: 10,
            poll_interval: Duration::from_millis(5),
            limit: Some(20),
        };
        let fetcher = Arc::new(
            UpdateFetcher::new(source.clone(), sink.clone(), settings)
                .with_clock(Arc::new(FixedClock(100))),
        );
        let (callback, seen) = recorder();

        let task = {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { fetcher.run(&callback).await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while source.cursors.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        fetcher.stop();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert!(!fetcher.is_running());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), vec!["a"]);
        let cursors = source.cursors.lock();
        assert_eq!(cursors[0], None);
        assert_eq!(cursors[1], None);
        assert_eq!(cursors[2].as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_second_run_returns_while_polling() {
        let fetcher = Arc::new(fetcher(ScriptedSource::with([]), 0, 5));
        let (callback, _) = recorder();

        let task = {
            let fetcher = Arc::clone(&fetcher);
            let callback = Arc::clone(&callback);
            tokio::spawn(async move { fetcher.run(&callback).await })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while !fetcher.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), fetcher.run(&callback))
            .await
            .unwrap();
        assert!(fetcher.is_running());

        fetcher.stop();
        task.await.unwrap();
    }
}
