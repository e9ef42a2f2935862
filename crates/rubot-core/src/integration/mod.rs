//! Integration layer - the Bot API surface.
//!
//! This module contains the pieces that talk to the outside world:
//! - [`ApiTransport`], the seam a network implementation plugs into
//! - [`BotApi`], typed wrappers over the RPC methods
//! - Request/response types (keypads, chats, upload descriptors)

pub mod api;
pub mod transport;
pub mod types;

pub use api::BotApi;
pub use transport::{ApiTransport, BoxedTransport};
pub use types::{
    Bot, BotCommand, Button, ButtonType, Chat, ChatKeypadType, ChatType, FileType, Keypad,
    KeypadRow, RejectedUpdate, SendMessageOptions, UpdateBatch, UpdateEndpointType, UploadFile,
};
