//! Mail folders.

use serde::{Deserialize, Serialize};

/// Names of the server-managed folders.
pub mod system {
    /// Incoming mail.
    pub const INBOX: &str = "inbox";
    /// Sent mail.
    pub const SENT: &str = "sent";
    /// Unsent drafts.
    pub const DRAFTS: &str = "drafts";
    /// Deleted mail awaiting purge.
    pub const TRASH: &str = "trash";
    /// Virtual folder of starred mail.
    pub const STARRED: &str = "starred";

    /// All system folder names.
    pub const ALL: [&str; 5] = [INBOX, SENT, DRAFTS, TRASH, STARRED];

    /// Returns true if `name` is a system folder (case-insensitive).
    #[must_use]
    pub fn is_system(name: &str) -> bool {
        ALL.iter().any(|f| f.eq_ignore_ascii_case(name.trim()))
    }
}

/// Whether a folder is server-managed or user-created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FolderKind {
    /// Built-in folder; cannot be renamed or deleted.
    System,
    /// User folder.
    #[default]
    Custom,
}

/// A folder with its counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Server id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Folder name.
    pub name: String,
    /// System or custom.
    #[serde(rename = "type", default)]
    pub kind: FolderKind,
    /// Messages in the folder.
    #[serde(default)]
    pub email_count: u32,
    /// Unread messages in the folder.
    #[serde(default)]
    pub unread_count: u32,
    /// Whether the user may rename or delete it.
    #[serde(default)]
    pub editable: bool,
}

impl Folder {
    /// Returns true if the folder may be renamed or deleted.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.editable && self.kind == FolderKind::Custom && !system::is_system(&self.name)
    }
}
