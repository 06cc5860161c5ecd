//! Error types for the client core.

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Push channel error.
    #[error("Push channel error: {0}")]
    Push(#[from] jaryn_push::Error),

    /// Malformed URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System keyring access failed.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// No session is active.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The server rejected the session token; the session has been cleared.
    #[error("Session expired")]
    Unauthorized,

    /// Login was refused.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The server answered with an error status.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the response body, or a generic one.
        message: String,
    },

    /// Input was rejected before any request was sent.
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    /// An attachment upload failed; the dependent send was abandoned.
    #[error("Attachment upload failed: {0}")]
    Upload(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds a server error, falling back to a generic message per status.
    #[must_use]
    pub fn server(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| generic_message(status).to_string());
        Self::Server { status, message }
    }

    /// HTTP status associated with this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Unauthorized | Self::InvalidCredentials => Some(401),
            _ => None,
        }
    }

    /// Returns true for errors that ended the session.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NotAuthenticated)
    }

    /// Text suitable for a user-visible notification.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Server { message, .. } | Self::Upload(message) => message.clone(),
            Self::Validation(errors) => join_messages(errors),
            Self::Http(_) | Self::Io(_) => "Network error, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

/// Generic text for a status when the body carries none.
const fn generic_message(status: u16) -> &'static str {
    match status {
        400 => "The request was rejected",
        403 => "You do not have access to this item",
        404 => "Not found",
        409 => "Already exists",
        413 => "File is too large",
        429 => "Too many requests, slow down",
        500..=599 => "Server error, please try again later",
        _ => "Something went wrong",
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
