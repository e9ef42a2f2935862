//! Foundation layer - data model and error taxonomy.
//!
//! This module contains the building blocks every other layer depends on:
//! - The [`Update`] model decoded from the Bot API
//! - The fixed set of [`EventKind`]s listeners subscribe to
//! - Error types shared by the transport, API and bus layers

pub mod error;
pub mod event;
pub mod update;

pub use error::{
    ApiError, ApiResult, ApiStatus, BoxError, ErrorSink, MiddlewareError, TransportError,
    TransportResult, UsageError, UsageResult,
};
pub use event::EventKind;
pub use update::{
    AuxData, ContactMessage, File, ForwardedFrom, ForwardedFromType, LiveLocation,
    LiveLocationStatus, Location, Message, PaymentState, PaymentStatus, Poll, PollState,
    PollStatus, SenderType, Sticker, Update, UpdateBody,
};
