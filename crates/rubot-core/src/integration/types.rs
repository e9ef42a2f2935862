//! Request and response types of the Bot API RPC surface.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::foundation::{File, Update};

// =============================================================================
// Keypads
// =============================================================================

/// Custom keypad layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    pub rows: Vec<KeypadRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize_keyboard: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_time_keyboard: Option<bool>,
}

impl Keypad {
    /// Creates an empty keypad.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row of buttons.
    pub fn row(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.rows.push(KeypadRow {
            buttons: buttons.into_iter().collect(),
        });
        self
    }

    /// Asks the client to fit the keyboard to its content.
    pub fn resize(mut self, enabled: bool) -> Self {
        self.resize_keyboard = Some(enabled);
        self
    }

    /// Hides the keyboard after one use.
    pub fn one_time(mut self, enabled: bool) -> Self {
        self.on_time_keyboard = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypadRow {
    pub buttons: Vec<Button>,
}

/// A keypad button.
///
/// Only the common fields are typed; advanced input configurations
/// (selection, calendar, pickers, textbox) pass through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub id: String,
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    pub button_text: String,
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Button {
    /// Creates a plain button.
    pub fn simple(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            button_type: ButtonType::Simple,
            button_text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonType {
    Simple,
    Selection,
    Calendar,
    NumberPicker,
    StringPicker,
    Location,
    Payment,
    CameraImage,
    CameraVideo,
    GalleryImage,
    GalleryVideo,
    File,
    Audio,
    RecordAudio,
    MyPhoneNumber,
    MyLocation,
    Textbox,
    Link,
    AskMyPhoneNumber,
    AskLocation,
    Barcode,
}

/// How a message affects the chat keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKeypadType {
    None,
    New,
    Remove,
}

// =============================================================================
// Entities
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatType {
    User,
    Bot,
    Group,
    Channel,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    pub chat_type: ChatType,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// The bot's own profile, as returned by `getMe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub bot_id: String,
    pub bot_title: String,
    #[serde(default)]
    pub avatar: Option<File>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub start_message: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

impl BotCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Upload category expected by `requestSendFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    File,
    Image,
    Voice,
    Video,
    Music,
    Gif,
}

impl FileType {
    /// Classifies a MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if let Some(image) = mime.strip_prefix("image/") {
            if image.contains("gif") {
                return Self::Gif;
            }
            return Self::Image;
        }
        if mime.starts_with("video/") {
            return Self::Video;
        }
        if let Some(audio) = mime.strip_prefix("audio/") {
            if audio.contains("mpeg") || audio.contains("mp3") || audio.contains("opus") {
                return Self::Music;
            }
            return Self::Voice;
        }
        Self::File
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Image => "Image",
            Self::Voice => "Voice",
            Self::Video => "Video",
            Self::Music => "Music",
            Self::Gif => "Gif",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint kinds accepted by `updateBotEndpoints`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateEndpointType {
    ReceiveUpdate,
    ReceiveInlineMessage,
    ReceiveQuery,
    GetSelectionItem,
    SearchSelectionItems,
}

// =============================================================================
// Options and results
// =============================================================================

/// Optional fields shared by the `send*` methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageOptions {
    pub disable_notification: bool,
    pub chat_keypad: Option<Keypad>,
    pub chat_keypad_type: Option<ChatKeypadType>,
    pub inline_keypad: Option<Keypad>,
    pub reply_to_message_id: Option<String>,
}

impl SendMessageOptions {
    pub fn reply_to(message_id: impl Into<String>) -> Self {
        Self {
            reply_to_message_id: Some(message_id.into()),
            ..Default::default()
        }
    }

    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }

    pub fn inline_keypad(mut self, keypad: Keypad) -> Self {
        self.inline_keypad = Some(keypad);
        self
    }

    pub fn chat_keypad(mut self, keypad: Keypad) -> Self {
        self.chat_keypad = Some(keypad);
        self.chat_keypad_type = Some(ChatKeypadType::New);
        self
    }

    /// Merges the set fields into a request body.
    pub(crate) fn apply(&self, body: &mut serde_json::Map<String, serde_json::Value>) {
        use serde_json::Value;

        if let Some(keypad) = &self.chat_keypad
            && let Ok(value) = serde_json::to_value(keypad)
        {
            body.insert("chat_keypad".into(), value);
        }
        if let Some(kind) = self.chat_keypad_type
            && let Ok(value) = serde_json::to_value(kind)
        {
            body.insert("chat_keypad_type".into(), value);
        }
        if self.disable_notification {
            body.insert("disable_notification".into(), Value::Bool(true));
        }
        if let Some(keypad) = &self.inline_keypad
            && let Ok(value) = serde_json::to_value(keypad)
        {
            body.insert("inline_keypad".into(), value);
        }
        if let Some(id) = &self.reply_to_message_id {
            body.insert("reply_to_message_id".into(), Value::String(id.clone()));
        }
    }
}

/// One page of `getUpdates`.
///
/// Updates are decoded one by one. An entry that does not decode lands in
/// `rejected` instead of failing the page, so the cursor still advances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUpdateBatch")]
pub struct UpdateBatch {
    pub updates: Vec<Update>,
    /// Cursor for the next page; absent when the client is caught up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset_id: Option<String>,
    #[serde(skip)]
    pub rejected: Vec<RejectedUpdate>,
}

impl UpdateBatch {
    pub fn new(updates: Vec<Update>, next_offset_id: Option<String>) -> Self {
        Self {
            updates,
            next_offset_id,
            rejected: Vec::new(),
        }
    }
}

/// A `getUpdates` entry that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedUpdate {
    pub reason: String,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct RawUpdateBatch {
    #[serde(default)]
    updates: Vec<serde_json::Value>,
    #[serde(default)]
    next_offset_id: Option<String>,
}

impl From<RawUpdateBatch> for UpdateBatch {
    fn from(raw: RawUpdateBatch) -> Self {
        let mut batch = UpdateBatch::new(Vec::with_capacity(raw.updates.len()), raw.next_offset_id);
        for value in raw.updates {
            match Update::deserialize(&value) {
                Ok(update) => batch.updates.push(update),
                Err(err) => batch.rejected.push(RejectedUpdate {
                    reason: err.to_string(),
                    raw: value,
                }),
            }
        }
        batch
    }
}

/// File bytes to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            data,
        }
    }

    /// The upload category implied by the MIME type.
    pub fn file_type(&self) -> FileType {
        FileType::from_mime(&self.mime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_batch_keeps_decodable_entries() {
        let batch: UpdateBatch = serde_json::from_value(json!({
            "updates": [
                { "type": "NewMessage", "chat_id": "c1",
                  "new_message": { "message_id": "1", "text": "hi", "time": "100" } },
                { "type": "UpdatedPayment", "chat_id": "c2",
                  "updated_payment": { "payment_id": "p", "status": "Refunded" } },
                { "type": "NewMessage", "chat_id": "c3",
                  "new_message": { "message_id": "2", "time": "soon" } }
            ],
            "next_offset_id": "n1"
        }))
        .unwrap();

        assert_eq!(batch.updates.len(), 1);
        assert_eq!(batch.updates[0].chat_id, "c1");
        assert_eq!(batch.rejected.len(), 2);
        assert!(batch.rejected[0].reason.contains("Refunded"));
        assert_eq!(batch.rejected[1].raw["chat_id"], "c3");
        assert_eq!(batch.next_offset_id.as_deref(), Some("n1"));
    }

    #[test]
    fn test_file_type_from_mime() {
        assert_eq!(FileType::from_mime("image/png"), FileType::Image);
        assert_eq!(FileType::from_mime("image/gif"), FileType::Gif);
        assert_eq!(FileType::from_mime("video/mp4"), FileType::Video);
        assert_eq!(FileType::from_mime("audio/mpeg"), FileType::Music);
        assert_eq!(FileType::from_mime("audio/ogg"), FileType::Voice);
        assert_eq!(FileType::from_mime("application/pdf"), FileType::File);
    }

    #[test]
    fn test_send_options_apply() {
        let mut body = serde_json::Map::new();
        SendMessageOptions::reply_to("7").silent().apply(&mut body);

        assert_eq!(body["reply_to_message_id"], "7");
        assert_eq!(body["disable_notification"], true);
        assert!(!body.contains_key("chat_keypad"));
    }

    #[test]
    fn test_keypad_serialization() {
        let keypad = Keypad::new()
            .row([Button::simple("yes", "Yes"), Button::simple("no", "No")])
            .resize(true);
        let value = serde_json::to_value(&keypad).unwrap();

        assert_eq!(value["rows"][0]["buttons"][1]["type"], "Simple");
        assert_eq!(value["rows"][0]["buttons"][1]["button_text"], "No");
        assert_eq!(value["resize_keyboard"], true);
        assert!(value.get("on_time_keyboard").is_none());
    }
}
