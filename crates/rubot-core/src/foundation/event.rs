//! Event kinds the bus dispatches on.

use std::fmt;

/// Every event a listener can subscribe to.
///
/// Variant events are derived from an update's type and, for new messages,
/// from which optional fields the message carries. [`EventKind::Update`] fires
/// for every update, after the variant events. [`EventKind::Error`] is
/// reserved for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Command,
    Contact,
    Error,
    File,
    ForwardedFrom,
    LiveLocation,
    Location,
    NewMessage,
    Poll,
    Query,
    RemovedMessage,
    StartedBot,
    Sticker,
    StoppedBot,
    UpdatedPayment,
    UpdatedMessage,
    Update,
}

impl EventKind {
    /// All event kinds, in declaration order.
    pub const ALL: [EventKind; 17] = [
        Self::Command,
        Self::Contact,
        Self::Error,
        Self::File,
        Self::ForwardedFrom,
        Self::LiveLocation,
        Self::Location,
        Self::NewMessage,
        Self::Poll,
        Self::Query,
        Self::RemovedMessage,
        Self::StartedBot,
        Self::Sticker,
        Self::StoppedBot,
        Self::UpdatedPayment,
        Self::UpdatedMessage,
        Self::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Contact => "contact",
            Self::Error => "error",
            Self::File => "file",
            Self::ForwardedFrom => "forwarded_from",
            Self::LiveLocation => "live_location",
            Self::Location => "location",
            Self::NewMessage => "new_message",
            Self::Poll => "poll",
            Self::Query => "query",
            Self::RemovedMessage => "removed_message",
            Self::StartedBot => "started_bot",
            Self::Sticker => "sticker",
            Self::StoppedBot => "stopped_bot",
            Self::UpdatedPayment => "updated_payment",
            Self::UpdatedMessage => "updated_message",
            Self::Update => "update",
        }
    }

    /// Returns `true` for the reserved error event.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
