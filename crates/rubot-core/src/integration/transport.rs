//! Transport seam between the typed API and the network.
//!
//! [`BotApi`](crate::BotApi) never touches HTTP directly. It hands a method
//! name and a JSON body to an [`ApiTransport`] and decodes the response
//! envelope itself, so the transport stays a thin byte mover that can be
//! replaced in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::types::UploadFile;
use crate::foundation::TransportResult;

/// Moves requests to the Bot API and back.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// POSTs `body` to `method` and returns the decoded JSON response.
    async fn call(&self, method: &str, body: Value) -> TransportResult<Value>;

    /// POSTs `file` as multipart form data to a URL issued by `requestSendFile`.
    async fn upload(&self, upload_url: &str, file: UploadFile) -> TransportResult<Value>;
}

/// Shared transport handle.
pub type BoxedTransport = Arc<dyn ApiTransport>;
