//! Address book contacts.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A saved contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Server-assigned id; absent until saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Contact {
    /// Creates an unsaved contact.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns a display string for the contact.
    ///
    /// If a name is present, returns "Name <email>", otherwise just "email".
    #[must_use]
    pub fn display(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

/// Contact list order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContactSort {
    /// Alphabetical by name.
    #[default]
    Name,
    /// Most recently added first.
    Date,
}

impl ContactSort {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Date => "date",
        }
    }
}

/// Contact field a search keyword is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContactField {
    /// Name or email.
    #[default]
    All,
    /// Name only.
    Name,
    /// Email only.
    Email,
}

impl ContactField {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Name => "name",
            Self::Email => "email",
        }
    }
}
