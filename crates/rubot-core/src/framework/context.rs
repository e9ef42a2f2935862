//! Per-update context handed to middleware and listeners.

use std::sync::Arc;

use crate::foundation::{ApiResult, EventKind, Message, Update};
use crate::integration::{BotApi, SendMessageOptions};

use super::view::{CommandView, FileView};

/// One inbound update plus a handle to the API that delivered it.
///
/// Building a context does no I/O. Contexts are shared as `Arc<Context>`
/// between every middleware and listener of a single dispatch.
#[derive(Debug, Clone)]
pub struct Context {
    update: Arc<Update>,
    api: BotApi,
}

impl Context {
    pub fn new(update: impl Into<Arc<Update>>, api: BotApi) -> Self {
        Self {
            update: update.into(),
            api,
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn api(&self) -> &BotApi {
        &self.api
    }

    /// Variant event of the update, `None` for unknown types.
    pub fn kind(&self) -> Option<EventKind> {
        self.update.kind()
    }

    pub fn chat_id(&self) -> &str {
        &self.update.chat_id
    }

    pub fn message(&self) -> Option<&Message> {
        self.update.message()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message().map(|m| m.message_id.as_str())
    }

    /// Message text, or an empty string.
    pub fn text(&self) -> &str {
        self.message().map(Message::text).unwrap_or_default()
    }

    pub fn is_command(&self) -> bool {
        self.message().is_some_and(Message::is_command)
    }

    /// Parses the message as `/name args...`.
    pub fn command(&self) -> Option<CommandView> {
        self.message().and_then(CommandView::from_message)
    }

    pub fn file(&self) -> Option<FileView> {
        self.message().and_then(FileView::from_message)
    }

    /// Sends `text` to this chat as a reply to the current message.
    pub async fn reply(&self, text: &str) -> ApiResult<String> {
        let options = self
            .message_id()
            .map(SendMessageOptions::reply_to)
            .unwrap_or_default();
        self.api.send_message(self.chat_id(), text, options).await
    }

    /// Sends `text` to this chat without quoting anything.
    pub async fn send(&self, text: &str) -> ApiResult<String> {
        self.api
            .send_message(self.chat_id(), text, SendMessageOptions::default())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::UpdateBody;
    use crate::integration::api::tests::ScriptedTransport;
    use serde_json::json;

    fn message_update(text: &str) -> Update {
        serde_json::from_value(json!({
            "type": "NewMessage",
            "chat_id": "c1",
            "new_message": { "message_id": "m7", "text": text, "time": "100" }
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let transport = ScriptedTransport::with([]);
        let ctx = Context::new(message_update("/start now"), BotApi::new(transport));

        assert_eq!(ctx.kind(), Some(EventKind::NewMessage));
        assert_eq!(ctx.chat_id(), "c1");
        assert_eq!(ctx.message_id(), Some("m7"));
        assert_eq!(ctx.text(), "/start now");
        assert!(ctx.is_command());
        let cmd = ctx.command().unwrap();
        assert_eq!(cmd.name, "start");
        assert_eq!(cmd.args, vec!["now"]);
        assert!(ctx.file().is_none());
    }

    #[test]
    fn test_removed_message_has_no_text() {
        let transport = ScriptedTransport::with([]);
        let update = Update::new(
            "c2",
            UpdateBody::RemovedMessage {
                removed_message_id: "m1".into(),
            },
        );
        let ctx = Context::new(update, BotApi::new(transport));

        assert_eq!(ctx.text(), "");
        assert!(ctx.message_id().is_none());
        assert!(!ctx.is_command());
    }

    #[tokio::test]
    async fn test_reply_quotes_current_message() {
        let transport = ScriptedTransport::with([Ok(json!({
            "status": "OK",
            "data": { "message_id": "m8" }
        }))]);
        let ctx = Context::new(message_update("hi"), BotApi::new(transport.clone()));

        let sent = ctx.reply("hello").await.unwrap();

        assert_eq!(sent, "m8");
        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["chat_id"], "c1");
        assert_eq!(calls[0].1["text"], "hello");
        assert_eq!(calls[0].1["reply_to_message_id"], "m7");
    }
}
