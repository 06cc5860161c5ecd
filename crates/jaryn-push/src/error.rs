//! Error types for the push channel.

use thiserror::Error;

/// Errors that can occur while connecting to or reading the push stream.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error while reading the stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server rejected the bearer token (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,

    /// The server answered with a non-success status other than 401.
    #[error("Push stream connection failed with status {0}")]
    Status(u16),

    /// The server closed the stream.
    #[error("Push stream closed by server")]
    Closed,

    /// Framing violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A payload was not a valid push event.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error means the credentials were rejected.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
