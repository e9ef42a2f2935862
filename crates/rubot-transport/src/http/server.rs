//! Webhook receiver.
//!
//! The Bot API pushes updates as JSON POSTs, either wrapped as
//! `{"update": {...}}` or as a bare update object. Each decoded update is
//! forwarded into an `mpsc` channel; the runtime owns the receiving end.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use rubot_core::{TransportResult, Update};

/// Decodes a webhook body into an [`Update`].
pub fn decode_update(body: &[u8]) -> serde_json::Result<Update> {
    let mut value: Value = serde_json::from_slice(body)?;
    if let Some(inner) = value
        .get_mut("update")
        .filter(|u| u.is_object())
        .map(Value::take)
    {
        value = inner;
    }
    serde_json::from_value(value)
}

/// Binds an HTTP endpoint that receives updates.
#[derive(Debug, Clone)]
pub struct WebhookServer {
    addr: String,
    path: String,
}

struct ServerState {
    sink: mpsc::Sender<Update>,
}

impl WebhookServer {
    /// `addr` is a `host:port` pair; `path` gets a leading `/` if missing.
    pub fn new(addr: impl Into<String>, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            addr: addr.into(),
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Starts serving in a background task.
    ///
    /// Fails only if the address cannot be bound.
    pub async fn listen(self, sink: mpsc::Sender<Update>) -> TransportResult<WebhookHandle> {
        let state = Arc::new(ServerState { sink });
        let router = Router::new()
            .route(&self.path, post(receive_update))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, path = %self.path, "Webhook server listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router);

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "Webhook server error");
                    }
                }
                _ = shutdown_rx => {
                    info!("Webhook server shutting down");
                }
            }
        });

        Ok(WebhookHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Running webhook server.
#[derive(Debug)]
pub struct WebhookHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebhookHandle {
    /// Address actually bound, useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the server and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Webhook server task ended abnormally");
        }
    }
}

impl Drop for WebhookHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn receive_update(State(state): State<Arc<ServerState>>, body: Bytes) -> impl IntoResponse {
    trace!(len = body.len(), "Received webhook POST");

    let update = match decode_update(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Rejected malformed webhook body");
            return (StatusCode::BAD_REQUEST, "invalid update");
        }
    };

    debug!(chat_id = %update.chat_id, kind = ?update.kind(), "Webhook update accepted");
    if state.sink.send(update).await.is_err() {
        warn!("Update receiver closed, dropping webhook update");
        return (StatusCode::SERVICE_UNAVAILABLE, "not running");
    }

    (StatusCode::OK, "ok")
}
