//! Typed push events.

use serde::{Deserialize, Deserializer, Serialize};

use crate::Result;

/// Kind of a push event, carried in the JSON `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushEventKind {
    /// A message was sent; recipients have new mail.
    Sent,
    /// A message was delivered into a mailbox.
    Received,
    /// A draft was saved.
    Draft,
    /// The server invalidated the session token.
    #[serde(rename = "Token_Expired", alias = "TokenExpired")]
    TokenExpired,
    /// Any kind this client does not know about.
    #[serde(other)]
    Unknown,
}

impl PushEventKind {
    /// Returns true for kinds that announce a new or changed message.
    #[must_use]
    pub const fn is_delivery(self) -> bool {
        matches!(self, Self::Sent | Self::Received | Self::Draft)
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: PushEventKind,
    /// Recipient addresses the event concerns.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub to: Vec<String>,
    /// Replacement token, when the server rotates credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl PushEvent {
    /// Creates an event of the given kind addressed to `to`.
    #[must_use]
    pub fn new<I, S>(kind: PushEventKind, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            to: to.into_iter().map(Into::into).collect(),
            token: None,
        }
    }

    /// Parses a payload taken from a `data:` line.
    ///
    /// A leftover `data:` prefix and surrounding whitespace are tolerated.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid event object.
    pub fn parse(payload: &str) -> Result<Self> {
        let trimmed = payload.trim();
        let json = trimmed.strip_prefix("data:").unwrap_or(trimmed).trim();
        Ok(serde_json::from_str(json)?)
    }

    /// Returns true if `address` is among the recipients (case-insensitive).
    #[must_use]
    pub fn is_addressed_to(&self, address: &str) -> bool {
        let address = address.trim();
        self.to
            .iter()
            .any(|recipient| recipient.trim().eq_ignore_ascii_case(address))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
