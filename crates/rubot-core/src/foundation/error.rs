//! Unified error types for the rubot core.
//!
//! Errors fall into three groups:
//!
//! - **Remote failures** ([`TransportError`], [`ApiError`]) raised while talking to
//!   the Bot API. These are reported through the error event and never stop the
//!   poll loop.
//! - **Usage errors** ([`UsageError`], [`MiddlewareError`]) raised immediately at
//!   the offending call site when the bus or the middleware chain is wired wrong.
//! - **Handler failures**, carried as [`BoxError`] so the error event receives
//!   the original value and can downcast it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::EventKind;

/// Type-erased error flowing out of user handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by an [`ApiTransport`](crate::ApiTransport) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("request to {method} failed: {reason}")]
    Request {
        /// Bot API method being called.
        method: String,
        /// Underlying failure.
        reason: String,
    },

    /// The request did not complete before the configured deadline.
    #[error("request to {method} timed out")]
    Timeout {
        /// Bot API method being called.
        method: String,
    },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} error: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response body was not valid JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Status field of every Bot API response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "SERVER_ERROR")]
    ServerError,
    #[serde(rename = "TOO_REQUESTS")]
    TooRequests,
    #[serde(rename = "INVALID_ACCESS")]
    InvalidAccess,
    /// A status this SDK does not know about yet.
    #[serde(other, rename = "UNKNOWN")]
    Unknown,
}

impl ApiStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::InvalidInput => "INVALID_INPUT",
            Self::ServerError => "SERVER_ERROR",
            Self::TooRequests => "TOO_REQUESTS",
            Self::InvalidAccess => "INVALID_ACCESS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` for [`ApiStatus::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the typed RPC wrappers on [`BotApi`](crate::BotApi).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered, but not with `OK`.
    #[error("{method} failed due to \"{status}\" status.")]
    Method {
        /// Bot API method name.
        method: &'static str,
        /// Status reported by the server.
        status: ApiStatus,
    },

    /// The call never produced a response envelope.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `sendPoll` was called without options.
    #[error("poll options must contain at least one entry")]
    EmptyPollOptions,

    /// `editChatKeypad` with type `New` needs a keypad.
    #[error("chat keypad is required when the keypad type is New")]
    MissingKeypad,

    /// The upload endpoint accepted the file but returned no id.
    #[error("upload response did not contain a file_id")]
    MissingFileId,

    /// A request or response body did not match the expected shape.
    #[error("malformed {method} payload: {reason}")]
    Serialization {
        /// Bot API method name.
        method: &'static str,
        /// Serde error text.
        reason: String,
    },
}

impl ApiError {
    /// Creates a serialization error for `method`.
    pub fn serialization(method: &'static str, err: impl fmt::Display) -> Self {
        Self::Serialization {
            method,
            reason: err.to_string(),
        }
    }

    /// Returns the remote status if the server rejected the call.
    pub fn status(&self) -> Option<ApiStatus> {
        match self {
            Self::Method { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// =============================================================================
// Usage Errors
// =============================================================================

/// Wiring mistakes on the [`EventBus`](crate::EventBus), raised at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    /// Error listeners must finish before the reporting call returns.
    #[error("listeners on the error event must be synchronous")]
    AsyncErrorListener,

    /// The error event only has a main phase.
    #[error("before/after listeners cannot be registered on the error event")]
    ErrorEventPhase,

    /// The listener's role does not fit the event it was registered on.
    #[error("a {listener} listener cannot be registered on the {kind} event")]
    ListenerMismatch {
        /// Event the listener was registered on.
        kind: EventKind,
        /// Role of the rejected listener.
        listener: &'static str,
    },

    /// The error event is emitted through `emit_error` only.
    #[error("the error event is reserved and can only be emitted with emit_error")]
    ReservedEvent,
}

/// Errors raised by the middleware chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// A middleware invoked its continuation twice.
    #[error("next() called multiple times")]
    NextCalledMultipleTimes,
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Fire-and-forget destination for failures that must not interrupt the caller.
///
/// The [`EventBus`](crate::EventBus) implements this by emitting the error
/// event; the poll loop and the RPC wrappers report through it.
pub trait ErrorSink: Send + Sync {
    /// Reports `err`. Must not block.
    fn report(&self, err: &(dyn std::error::Error + Send + Sync + 'static));
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for Bot API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for event bus registration.
pub type UsageResult<T> = Result<T, UsageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_error_message() {
        let err = ApiError::Method {
            method: "sendMessage",
            status: ApiStatus::InvalidAccess,
        };
        assert_eq!(
            err.to_string(),
            "sendMessage failed due to \"INVALID_ACCESS\" status."
        );
        assert_eq!(err.status(), Some(ApiStatus::InvalidAccess));
    }

    #[test]
    fn test_unknown_status_deserializes() {
        let status: ApiStatus = serde_json::from_str("\"RATE_LIMITED\"").unwrap();
        assert_eq!(status, ApiStatus::Unknown);

        let status: ApiStatus = serde_json::from_str("\"TOO_REQUESTS\"").unwrap();
        assert_eq!(status, ApiStatus::TooRequests);
    }

    #[test]
    fn test_next_called_twice_message() {
        assert_eq!(
            MiddlewareError::NextCalledMultipleTimes.to_string(),
            "next() called multiple times"
        );
    }
}
