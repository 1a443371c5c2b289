//! Crate-level error type.
//!
//! Every fallible operation in the client returns [`RobinError`]. The variants
//! follow the lifecycle stage that failed, so a caller can tell a rejected
//! login apart from a broken room page or a lost socket without inspecting
//! the message text.

use thiserror::Error;

/// Errors produced by the Robin client.
#[derive(Debug, Error)]
pub enum RobinError {
    /// An HTTP request or socket operation could not be completed.
    #[error("transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },

    /// The server answered with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Credentials were rejected or the login response was malformed.
    #[error("login failed: {0}")]
    Auth(String),

    /// Room setup could not be resolved.
    #[error("setup failed: {0}")]
    Setup(String),

    /// An inbound frame could not be understood. Recovered per frame.
    #[error("malformed frame: {0}")]
    Protocol(String),

    /// Rejoining the room after a merge failed. The client is left without
    /// a live connection.
    #[error("merge recovery failed: {0}")]
    MergeRecovery(#[source] Box<RobinError>),

    /// The stream ended without a merge. `cause` holds the socket error
    /// when the connection failed rather than being closed by the server.
    #[error("disconnected from room {room}")]
    Disconnected {
        room: String,
        #[source]
        cause: Option<Box<RobinError>>,
    },

    /// Invalid configuration or missing credentials.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation needed a session or room setup that does not exist yet.
    #[error("client is not initialized; call init() first")]
    NotInitialized,
}

impl RobinError {
    pub(crate) fn transport(url: impl Into<String>, detail: impl ToString) -> Self {
        RobinError::Transport {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether this error ends the operation that raised it.
    ///
    /// Only [`RobinError::Protocol`] is recoverable: the offending frame is
    /// dropped and the stream keeps going.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RobinError::Protocol(_))
    }

    /// Whether this error belongs to the transport layer (network or status).
    pub fn is_transport(&self) -> bool {
        matches!(self, RobinError::Transport { .. } | RobinError::Status { .. })
    }
}
