//! Update model delivered by `getUpdates` and webhook calls.
//!
//! An [`Update`] carries the chat it belongs to and exactly one payload,
//! selected by the JSON `type` tag:
//!
//! ```text
//! Update { chat_id, body }
//! ├── NewMessage      { new_message }
//! ├── UpdatedMessage  { updated_message }
//! ├── RemovedMessage  { removed_message_id }
//! ├── StartedBot      { new_message? }
//! ├── StoppedBot      { new_message? }
//! ├── UpdatedPayment  { updated_payment }
//! └── Unknown
//! ```
//!
//! The server is loose about numeric fields: timestamps and ids arrive either
//! as JSON numbers or as strings. Both shapes are accepted.

use serde::{Deserialize, Deserializer, Serialize};

use super::event::EventKind;

// =============================================================================
// Update
// =============================================================================

/// One server-pushed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Chat the update belongs to.
    #[serde(default)]
    pub chat_id: String,

    /// Variant payload.
    #[serde(flatten)]
    pub body: UpdateBody,
}

/// Variant payload of an [`Update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateBody {
    NewMessage {
        new_message: Message,
    },
    UpdatedMessage {
        updated_message: Message,
    },
    RemovedMessage {
        #[serde(deserialize_with = "flexible_string")]
        removed_message_id: String,
    },
    StartedBot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_message: Option<Message>,
    },
    StoppedBot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_message: Option<Message>,
    },
    UpdatedPayment {
        updated_payment: PaymentStatus,
    },
    /// A type tag this SDK does not know.
    #[serde(other)]
    Unknown,
}

impl Update {
    /// Creates an update for `chat_id`.
    pub fn new(chat_id: impl Into<String>, body: UpdateBody) -> Self {
        Self {
            chat_id: chat_id.into(),
            body,
        }
    }

    /// The event matching this update's type, if it has one.
    pub fn kind(&self) -> Option<EventKind> {
        match &self.body {
            UpdateBody::NewMessage { .. } => Some(EventKind::NewMessage),
            UpdateBody::UpdatedMessage { .. } => Some(EventKind::UpdatedMessage),
            UpdateBody::RemovedMessage { .. } => Some(EventKind::RemovedMessage),
            UpdateBody::StartedBot { .. } => Some(EventKind::StartedBot),
            UpdateBody::StoppedBot { .. } => Some(EventKind::StoppedBot),
            UpdateBody::UpdatedPayment { .. } => Some(EventKind::UpdatedPayment),
            UpdateBody::Unknown => None,
        }
    }

    /// The message carried by this update, for any variant that has one.
    pub fn message(&self) -> Option<&Message> {
        match &self.body {
            UpdateBody::NewMessage { new_message } => Some(new_message),
            UpdateBody::UpdatedMessage { updated_message } => Some(updated_message),
            UpdateBody::StartedBot { new_message } | UpdateBody::StoppedBot { new_message } => {
                new_message.as_ref()
            }
            _ => None,
        }
    }

    /// The message subject to freshness filtering.
    ///
    /// Only new and updated messages are filtered by time; every other
    /// variant is always delivered.
    pub fn timed_message(&self) -> Option<&Message> {
        match &self.body {
            UpdateBody::NewMessage { new_message } => Some(new_message),
            UpdateBody::UpdatedMessage { updated_message } => Some(updated_message),
            _ => None,
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// A chat message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "flexible_string")]
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Seconds since the Unix epoch.
    #[serde(
        default,
        deserialize_with = "flexible_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<u64>,

    #[serde(default)]
    pub is_edited: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<SenderType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    /// Button/start payload attached by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<AuxData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<File>,

    #[serde(
        default,
        deserialize_with = "flexible_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub reply_to_message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_from: Option<ForwardedFrom>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_no_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<Sticker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_message: Option<ContactMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_location: Option<LiveLocation>,
}

impl Message {
    /// Message text, or an empty string.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    /// Whether the text looks like a `/command`.
    pub fn is_command(&self) -> bool {
        let text = self.text();
        text.starts_with('/') && text.len() > 1
    }
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderType {
    User,
    Bot,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_id: Option<String>,
}

/// File descriptor attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(default, deserialize_with = "flexible_string")]
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Size in bytes, as reported by the server.
    #[serde(
        default,
        deserialize_with = "flexible_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<String>,
}

/// Origin of a forwarded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardedFromType {
    User,
    Channel,
    Bot,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedFrom {
    pub type_from: ForwardedFromType,
    #[serde(
        default,
        deserialize_with = "flexible_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_sender_id: Option<String>,
}

/// Geographic location. Coordinates travel as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "flexible_string")]
    pub longitude: String,
    #[serde(deserialize_with = "flexible_string")]
    pub latitude: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub sticker_id: String,
    pub file: File,
    #[serde(default)]
    pub emoji_character: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_status: Option<PollStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollStatus {
    pub state: PollState,
    /// Index the current user voted for, `-1` if none.
    #[serde(default)]
    pub selection_index: i64,
    #[serde(default)]
    pub percent_vote_options: Vec<f64>,
    #[serde(default)]
    pub total_vote: u64,
    #[serde(default)]
    pub show_total_votes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveLocationStatus {
    Stopped,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLocation {
    #[serde(deserialize_with = "flexible_string")]
    pub start_time: String,
    #[serde(default)]
    pub live_period: u64,
    pub current_location: Location,
    #[serde(default)]
    pub user_id: String,
    pub status: LiveLocationStatus,
    #[serde(default, deserialize_with = "flexible_string")]
    pub last_update_time: String,
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    Paid,
    NotPaid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_id: String,
    pub status: PaymentState,
}

// =============================================================================
// Lenient field decoding
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
        }
    }
}

fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn flexible_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Unsigned(n)) => Ok(Some(n)),
        Some(StringOrNumber::Signed(n)) => Ok(u64::try_from(n).ok()),
        Some(StringOrNumber::Float(n)) if n >= 0.0 => Ok(Some(n as u64)),
        Some(StringOrNumber::Float(_)) => Ok(None),
        Some(StringOrNumber::String(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrNumber::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
