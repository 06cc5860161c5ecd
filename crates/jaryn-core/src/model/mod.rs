//! Wire and domain models for the mail backend.

mod attachment;
mod contact;
mod email;
mod filter;
mod folder;

pub use attachment::{AttachmentDescriptor, OutgoingFile, mime_from_file_name};
pub use contact::{Contact, ContactField, ContactSort};
pub use email::{Email, EmailPage, MessageId, OutgoingEmail, SearchField, SortBy};
pub use filter::{Condition, Filter, FilterAction, MatchField, Matcher};
pub use folder::{Folder, FolderKind, system};
