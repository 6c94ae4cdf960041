//! Error types for the test client.
//!
//! # Design
//! One enum covers every failure a caller can observe. Target and header
//! validation fail before the application is ever invoked. `Http` is only
//! produced by an explicit `Response::error_for_status` call, never by the
//! exchange itself. `Protocol` reports an application that broke the
//! message-ordering contract; it is an assertion about the code under test,
//! so it is returned even when server exceptions are suppressed.

use thiserror::Error;

/// Errors returned by the exchange and session drivers.
#[derive(Debug, Error)]
pub enum Error {
    /// The target has no scheme or no host after resolving against the base URL.
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The caller-supplied headers have an unsupported shape or illegal bytes.
    #[error("invalid headers: {0}")]
    InvalidHeaders(String),

    /// A body or frame could not be decoded as the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// A request payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The response carries a 4xx or 5xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A close signal was observed where a payload was expected.
    #[error("websocket disconnected with code {code}")]
    Disconnected { code: u16 },

    /// A blocking client was used while a runtime is active on this thread.
    #[error("a tokio runtime is already running on this thread; use the async client")]
    SchedulerBusy,

    /// The blocking client could not start its runtime.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The application broke the message-ordering contract.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The application returned an error.
    #[error("application error: {0}")]
    Application(#[source] anyhow::Error),
}

impl Error {
    pub(crate) fn invalid_target(target: &str, reason: impl Into<String>) -> Self {
        Error::InvalidTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
