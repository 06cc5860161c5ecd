//! Email models.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::AttachmentDescriptor;

/// Server-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates a message id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

const fn default_priority() -> u8 {
    3
}

/// A message as the server reports it, used for list rows and the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Message identifier.
    pub message_id: MessageId,
    /// Sender address.
    #[serde(default)]
    pub from: String,
    /// Recipient addresses.
    #[serde(default)]
    pub to: Vec<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Body (HTML or plain text).
    #[serde(default)]
    pub body: String,
    /// Server-local timestamp.
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    /// 1 (highest) to 4 (lowest).
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Read flag.
    #[serde(rename = "isRead", alias = "read", default)]
    pub is_read: bool,
    /// Starred flag.
    #[serde(rename = "isStarred", alias = "starred", default)]
    pub is_starred: bool,
    /// Draft flag.
    #[serde(rename = "isDraft", alias = "draft", default)]
    pub is_draft: bool,
    /// Folder holding the message.
    #[serde(default)]
    pub folder: String,
    /// Attachment metadata.
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
    /// When the message entered the trash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<NaiveDateTime>,
}

impl Email {
    /// Creates an unread inbox message with the given id and subject.
    #[must_use]
    pub fn new(id: impl Into<MessageId>, subject: impl Into<String>) -> Self {
        Self {
            message_id: id.into(),
            from: String::new(),
            to: Vec::new(),
            subject: subject.into(),
            body: String::new(),
            timestamp: None,
            priority: default_priority(),
            is_read: false,
            is_starred: false,
            is_draft: false,
            folder: super::system::INBOX.to_string(),
            attachments: Vec::new(),
            deleted_at: None,
        }
    }

    /// Returns true if the message carries attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// One page of a folder listing.
///
/// Pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailPage {
    /// Messages on this page.
    #[serde(alias = "emails", alias = "results")]
    pub content: Vec<Email>,
    /// Page number.
    #[serde(alias = "number")]
    pub current_page: u32,
    /// Requested page size.
    #[serde(alias = "size")]
    pub page_size: u32,
    /// Number of pages.
    pub total_pages: u32,
    /// Number of messages across all pages.
    #[serde(alias = "totalElements")]
    pub total_emails: u64,
    /// Folder the page was listed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl EmailPage {
    /// Returns true if a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Date,
    /// Highest priority first.
    Priority,
}

impl SortBy {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Priority => "priority",
        }
    }
}

/// Which field a search keyword is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    /// Subject, body, sender and recipients.
    #[default]
    All,
    /// Subject only.
    Subject,
    /// Body only.
    Body,
    /// Sender only.
    Sender,
}

impl SearchField {
    /// Query parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Subject => "subject",
            Self::Body => "body",
            Self::Sender => "sender",
        }
    }
}

/// A message being composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    /// Sender; filled in by the server when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body.
    pub body: String,
    /// 1 (highest) to 4 (lowest).
    pub priority: u8,
    /// Attachments referenced by id.
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
}

impl OutgoingEmail {
    /// Creates a normal-priority message without attachments.
    #[must_use]
    pub fn new<I, S>(to: I, subject: impl Into<String>, body: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: None,
            to: to.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
            priority: default_priority(),
            attachments: Vec::new(),
        }
    }

    /// Parses a comma-separated recipient field.
    #[must_use]
    pub fn parse_recipients(field: &str) -> Vec<String> {
        field
            .split([',', ';'])
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Addresses allowed to read the attachments: recipients plus sender.
    #[must_use]
    pub fn accessors(&self, sender: &str) -> Vec<String> {
        let mut accessors: Vec<String> = Vec::with_capacity(self.to.len() + 1);
        for address in self.to.iter().map(|a| a.trim()).chain([sender.trim()]) {
            if !address.is_empty() && !accessors.iter().any(|a| a.eq_ignore_ascii_case(address)) {
                accessors.push(address.to_string());
            }
        }
        accessors
    }
}
