//! Typed wrappers over the Bot API methods.
//!
//! Every call goes through [`BotApi::request`], which posts the body through
//! the [`ApiTransport`], unwraps the `{ status, data }` envelope and maps a
//! non-`OK` status to [`ApiError::Method`]. Transport failures are also
//! reported to the error sink (usually the event bus) before being returned,
//! so handlers that ignore the `Result` still leave a trace.
//!
//! ```rust,ignore
//! let api = BotApi::new(transport);
//! let me = api.get_me().await?;
//! api.send_message("chat", "hello", SendMessageOptions::default()).await?;
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use super::transport::{ApiTransport, BoxedTransport};
use super::types::{
    Bot, BotCommand, Chat, ChatKeypadType, FileType, Keypad, SendMessageOptions, UpdateBatch,
    UpdateEndpointType, UploadFile,
};
use crate::foundation::{ApiError, ApiResult, ApiStatus, ErrorSink, TransportError};

/// Response envelope shared by every method.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: ApiStatus,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct MessageIdData {
    message_id: String,
}

/// Handle for issuing Bot API calls.
///
/// Cheap to clone; every [`Context`](crate::Context) carries one.
#[derive(Clone)]
pub struct BotApi {
    transport: BoxedTransport,
    errors: Option<Weak<dyn ErrorSink>>,
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("reports_errors", &self.errors.is_some())
            .finish()
    }
}

impl BotApi {
    /// Creates an API handle over `transport`.
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self {
            transport,
            errors: None,
        }
    }

    /// Reports transport failures to `sink`.
    ///
    /// Only a weak reference is kept, so listeners capturing this handle do
    /// not keep the bus alive.
    pub fn with_error_sink(mut self, sink: Weak<dyn ErrorSink>) -> Self {
        self.errors = Some(sink);
        self
    }

    fn report(&self, err: &TransportError) {
        if let Some(sink) = self.errors.as_ref().and_then(Weak::upgrade) {
            sink.report(err);
        }
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Calls `method` and decodes `data` into `T`, reporting transport failures.
    pub async fn request<T>(&self, method: &'static str, body: Value) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        match self.request_unreported(method, body).await {
            Err(ApiError::Transport(err)) => {
                self.report(&err);
                Err(ApiError::Transport(err))
            }
            other => other,
        }
    }

    /// Like [`request`](Self::request) but leaves reporting to the caller.
    pub(crate) async fn request_unreported<T>(
        &self,
        method: &'static str,
        body: Value,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        trace!(method, "Calling Bot API");
        let raw = self.transport.call(method, body).await?;
        let envelope: Envelope =
            serde_json::from_value(raw).map_err(|e| ApiError::serialization(method, e))?;

        if !envelope.status.is_ok() {
            debug!(method, status = %envelope.status, "Bot API call rejected");
            return Err(ApiError::Method {
                method,
                status: envelope.status,
            });
        }

        serde_json::from_value(envelope.data).map_err(|e| ApiError::serialization(method, e))
    }

    async fn request_message_id(&self, method: &'static str, body: Value) -> ApiResult<String> {
        let data: MessageIdData = self.request(method, body).await?;
        Ok(data.message_id)
    }

    // =========================================================================
    // Bot
    // =========================================================================

    /// Returns the bot's own profile.
    pub async fn get_me(&self) -> ApiResult<Bot> {
        #[derive(Deserialize)]
        struct Data {
            bot: Bot,
        }
        let data: Data = self.request("getMe", json!({})).await?;
        Ok(data.bot)
    }

    /// Fetches one page of updates.
    pub async fn get_updates(
        &self,
        offset_id: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResult<UpdateBatch> {
        self.request("getUpdates", updates_body(offset_id, limit))
            .await
    }

    /// Fetches one page of updates without reporting transport failures.
    pub async fn poll_updates(
        &self,
        offset_id: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResult<UpdateBatch> {
        self.request_unreported("getUpdates", updates_body(offset_id, limit))
            .await
    }

    /// Replaces the bot's command list.
    pub async fn set_commands(&self, commands: &[BotCommand]) -> ApiResult<()> {
        self.request::<Value>("setCommands", json!({ "bot_commands": commands }))
            .await
            .map(drop)
    }

    /// Points an endpoint kind at `url`.
    pub async fn update_bot_endpoint(
        &self,
        url: &str,
        endpoint: UpdateEndpointType,
    ) -> ApiResult<()> {
        self.request::<Value>(
            "updateBotEndpoints",
            json!({ "url": url, "type": endpoint }),
        )
        .await
        .map(drop)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Sends a text message and returns its id.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        options: SendMessageOptions,
    ) -> ApiResult<String> {
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("text".into(), text.into());
        options.apply(&mut body);
        self.request_message_id("sendMessage", Value::Object(body))
            .await
    }

    /// Sends a poll. `options` must not be empty.
    pub async fn send_poll(
        &self,
        chat_id: &str,
        question: &str,
        options: &[String],
        send: SendMessageOptions,
    ) -> ApiResult<String> {
        if options.is_empty() {
            return Err(ApiError::EmptyPollOptions);
        }
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("question".into(), question.into());
        body.insert("options".into(), json!(options));
        send.apply(&mut body);
        self.request_message_id("sendPoll", Value::Object(body))
            .await
    }

    pub async fn send_location(
        &self,
        chat_id: &str,
        latitude: &str,
        longitude: &str,
        options: SendMessageOptions,
    ) -> ApiResult<String> {
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("latitude".into(), latitude.into());
        body.insert("longitude".into(), longitude.into());
        options.apply(&mut body);
        self.request_message_id("sendLocation", Value::Object(body))
            .await
    }

    /// Sends a contact card. Numbers without the `98` country code get it prefixed.
    pub async fn send_contact(
        &self,
        chat_id: &str,
        first_name: &str,
        last_name: &str,
        phone_number: &str,
        options: SendMessageOptions,
    ) -> ApiResult<String> {
        let phone_number = if phone_number.starts_with("98") {
            phone_number.to_string()
        } else {
            format!("98{phone_number}")
        };
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("first_name".into(), first_name.into());
        body.insert("last_name".into(), last_name.into());
        body.insert("phone_number".into(), phone_number.into());
        options.apply(&mut body);
        self.request_message_id("sendContact", Value::Object(body))
            .await
    }

    /// Forwards a message and returns the id of the copy.
    pub async fn forward_message(
        &self,
        from_chat_id: &str,
        to_chat_id: &str,
        message_id: &str,
        disable_notification: bool,
    ) -> ApiResult<String> {
        #[derive(Deserialize)]
        struct Data {
            new_message_id: String,
        }
        let data: Data = self
            .request(
                "forwardMessage",
                json!({
                    "from_chat_id": from_chat_id,
                    "message_id": message_id,
                    "to_chat_id": to_chat_id,
                    "disable_notification": disable_notification,
                }),
            )
            .await?;
        Ok(data.new_message_id)
    }

    pub async fn edit_message_text(
        &self,
        chat_id: &str,
        message_id: &str,
        text: &str,
    ) -> ApiResult<()> {
        self.request::<Value>(
            "editMessageText",
            json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
        )
        .await
        .map(drop)
    }

    pub async fn edit_message_keypad(
        &self,
        chat_id: &str,
        message_id: &str,
        inline_keypad: &Keypad,
    ) -> ApiResult<()> {
        self.request::<Value>(
            "editMessageKeypad",
            json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "inline_keypad": inline_keypad,
            }),
        )
        .await
        .map(drop)
    }

    pub async fn delete_message(&self, chat_id: &str, message_id: &str) -> ApiResult<()> {
        self.request::<Value>(
            "deleteMessage",
            json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
        .map(drop)
    }

    // =========================================================================
    // Chats
    // =========================================================================

    pub async fn get_chat(&self, chat_id: &str) -> ApiResult<Chat> {
        #[derive(Deserialize)]
        struct Data {
            chat: Chat,
        }
        let data: Data = self
            .request("getChat", json!({ "chat_id": chat_id }))
            .await?;
        Ok(data.chat)
    }

    /// Sets or removes the persistent chat keypad.
    ///
    /// [`ChatKeypadType::New`] requires `keypad`.
    pub async fn edit_chat_keypad(
        &self,
        chat_id: &str,
        keypad_type: ChatKeypadType,
        keypad: Option<&Keypad>,
    ) -> ApiResult<()> {
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("chat_keypad_type".into(), json!(keypad_type));
        match (keypad_type, keypad) {
            (ChatKeypadType::New, None) => return Err(ApiError::MissingKeypad),
            (ChatKeypadType::New, Some(keypad)) => {
                body.insert("chat_keypad".into(), json!(keypad));
            }
            _ => {}
        }
        self.request::<Value>("editChatKeypad", Value::Object(body))
            .await
            .map(drop)
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Returns a download URL for `file_id`.
    pub async fn get_file(&self, file_id: &str) -> ApiResult<String> {
        #[derive(Deserialize)]
        struct Data {
            download_url: String,
        }
        let data: Data = self
            .request("getFile", json!({ "file_id": file_id }))
            .await?;
        Ok(data.download_url)
    }

    /// Asks for a one-shot upload URL.
    pub async fn request_send_file(&self, file_type: FileType) -> ApiResult<String> {
        #[derive(Deserialize)]
        struct Data {
            upload_url: String,
        }
        let data: Data = self
            .request("requestSendFile", json!({ "type": file_type }))
            .await?;
        Ok(data.upload_url)
    }

    /// Uploads `file` and returns the server-side file id.
    pub async fn upload_file(&self, file: UploadFile) -> ApiResult<String> {
        let upload_url = self.request_send_file(file.file_type()).await?;
        debug!(file_name = %file.file_name, size = file.data.len(), "Uploading file");

        let response = match self.transport.upload(&upload_url, file).await {
            Ok(response) => response,
            Err(err) => {
                self.report(&err);
                return Err(err.into());
            }
        };

        response
            .get("data")
            .and_then(|data| data.get("file_id"))
            .and_then(|id| match id {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or(ApiError::MissingFileId)
    }

    /// Sends a previously uploaded file.
    pub async fn send_file(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: Option<&str>,
        options: SendMessageOptions,
    ) -> ApiResult<String> {
        let mut body = Map::new();
        body.insert("chat_id".into(), chat_id.into());
        body.insert("file_id".into(), file_id.into());
        if let Some(text) = caption {
            body.insert("text".into(), text.into());
        }
        options.apply(&mut body);
        self.request_message_id("sendFile", Value::Object(body))
            .await
    }
}

fn updates_body(offset_id: Option<&str>, limit: Option<u32>) -> Value {
    let mut body = Map::new();
    if let Some(offset_id) = offset_id {
        body.insert("offset_id".into(), offset_id.into());
    }
    if let Some(limit) = limit {
        body.insert("limit".into(), limit.into());
    }
    Value::Object(body)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::foundation::TransportResult;

    /// Transport double that records calls and replays scripted responses.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub calls: Mutex<Vec<(String, Value)>>,
        pub responses: Mutex<VecDeque<TransportResult<Value>>>,
        pub uploads: Mutex<Vec<(String, UploadFile)>>,
    }

    impl ScriptedTransport {
        pub fn with(responses: impl IntoIterator<Item = TransportResult<Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl ApiTransport for ScriptedTransport {
        async fn call(&self, method: &str, body: Value) -> TransportResult<Value> {
            self.calls.lock().push((method.to_string(), body));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "status": "OK", "data": {} })))
        }

        async fn upload(&self, upload_url: &str, file: UploadFile) -> TransportResult<Value> {
            self.uploads.lock().push((upload_url.to_string(), file));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "status": "OK", "data": {} })))
        }
    }

    struct CountingSink(AtomicUsize);

    impl ErrorSink for CountingSink {
        fn report(&self, _err: &(dyn std::error::Error + Send + Sync + 'static)) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_send_message_body_and_result() {
        let transport = ScriptedTransport::with([Ok(
            json!({ "status": "OK", "data": { "message_id": "555" } }),
        )]);
        let api = BotApi::new(transport.clone());

        let id = api
            .send_message("c1", "hi", SendMessageOptions::reply_to("9"))
            .await
            .unwrap();

        assert_eq!(id, "555");
        let calls = transport.calls.lock();
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(
            calls[0].1,
            json!({ "chat_id": "c1", "text": "hi", "reply_to_message_id": "9" })
        );
    }

    #[tokio::test]
    async fn test_non_ok_status_is_method_error() {
        let transport =
            ScriptedTransport::with([Ok(json!({ "status": "INVALID_ACCESS", "data": null }))]);
        let api = BotApi::new(transport);

        let err = api.get_me().await.unwrap_err();
        assert_eq!(err.to_string(), "getMe failed due to \"INVALID_ACCESS\" status.");
    }

    #[tokio::test]
    async fn test_empty_poll_rejected_before_network() {
        let transport = ScriptedTransport::with([]);
        let api = BotApi::new(transport.clone());

        let err = api
            .send_poll("c1", "?", &[], SendMessageOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::EmptyPollOptions));
        assert!(transport.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_new_chat_keypad_requires_keypad() {
        let transport = ScriptedTransport::with([]);
        let api = BotApi::new(transport.clone());

        let err = api
            .edit_chat_keypad("c1", ChatKeypadType::New, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingKeypad));

        api.edit_chat_keypad("c1", ChatKeypadType::Remove, None)
            .await
            .unwrap();
        assert_eq!(transport.calls.lock()[0].1["chat_keypad_type"], "Remove");
    }

    #[tokio::test]
    async fn test_contact_phone_prefix() {
        let transport = ScriptedTransport::with([
            Ok(json!({ "status": "OK", "data": { "message_id": "1" } })),
            Ok(json!({ "status": "OK", "data": { "message_id": "2" } })),
        ]);
        let api = BotApi::new(transport.clone());

        api.send_contact("c", "A", "B", "9121234567", Default::default())
            .await
            .unwrap();
        api.send_contact("c", "A", "B", "989121234567", Default::default())
            .await
            .unwrap();

        let calls = transport.calls.lock();
        assert_eq!(calls[0].1["phone_number"], "989121234567");
        assert_eq!(calls[1].1["phone_number"], "989121234567");
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported_once() {
        let transport = ScriptedTransport::with([
            Err(TransportError::Timeout {
                method: "getMe".into(),
            }),
            Err(TransportError::Timeout {
                method: "getUpdates".into(),
            }),
        ]);
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let weak: Weak<dyn ErrorSink> = Arc::downgrade(&(sink.clone() as Arc<dyn ErrorSink>));
        let api = BotApi::new(transport).with_error_sink(weak);

        assert!(matches!(
            api.get_me().await,
            Err(ApiError::Transport(TransportError::Timeout { .. }))
        ));
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        assert!(api.poll_updates(None, None).await.is_err());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_file_flow() {
        let transport = ScriptedTransport::with([
            Ok(json!({ "status": "OK", "data": { "upload_url": "https://up/1" } })),
            Ok(json!({ "status": "OK", "data": { "file_id": "f-77" } })),
        ]);
        let api = BotApi::new(transport.clone());

        let file = UploadFile::new("cat.png", "image/png", vec![1, 2, 3]);
        let id = api.upload_file(file).await.unwrap();

        assert_eq!(id, "f-77");
        assert_eq!(transport.calls.lock()[0].1, json!({ "type": "Image" }));
        assert_eq!(transport.uploads.lock()[0].0, "https://up/1");
    }

    #[tokio::test]
    async fn test_upload_without_file_id() {
        let transport = ScriptedTransport::with([
            Ok(json!({ "status": "OK", "data": { "upload_url": "https://up/1" } })),
            Ok(json!({ "status": "OK", "data": {} })),
        ]);
        let api = BotApi::new(transport);

        let file = UploadFile::new("a.bin", "application/octet-stream", vec![]);
        assert!(matches!(
            api.upload_file(file).await,
            Err(ApiError::MissingFileId)
        ));
    }
}
