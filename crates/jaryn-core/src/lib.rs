//! # jaryn-core
//!
//! Client core for Jaryn Mail.
//!
//! This crate provides:
//! - **Session gate** - durable token storage and a single idempotent logout
//!   shared by the REST client and the push channel
//! - **REST client** - typed wrappers for mail, attachments, contacts, folders,
//!   filters and account endpoints
//! - **Event router** - push events in, list-refresh and unread-count signals out
//! - **Mutation coordinator** - optimistic flag toggles with rollback and
//!   confirm-first destructive actions against a generation-guarded view
//! - **Upload pipeline** - transactional and non-transactional attachment sends
//!   with shared progress
//! - **Validation** - compose, folder, contact, filter and account checks
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::{Arc, Mutex};
//! use jaryn_core::{
//!     ApiClient, ClientConfig, EventRouter, KeyringSessionStore, MailboxView, MutationCoordinator,
//!     NoopNavigator, SessionGate, Signals, SortBy,
//! };
//!
//! let config = Arc::new(ClientConfig::default());
//! let signals = Signals::new();
//! let store = Arc::new(KeyringSessionStore::default_location()?);
//! let session = Arc::new(SessionGate::new(store, signals.logout.clone(), &config.mail_domain));
//! let api = Arc::new(ApiClient::new(Arc::clone(&config), Arc::clone(&session))?);
//! api.login("alice", "Secret123").await?;
//!
//! let mut router = EventRouter::http(config.push_config(), Arc::clone(&session), signals.clone());
//! router.connect().await;
//!
//! let view = Arc::new(Mutex::new(MailboxView::new("inbox")));
//! let mail = MutationCoordinator::new(api, view, signals, Arc::new(NoopNavigator));
//! mail.open_folder("inbox", SortBy::Date).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod coordinator;
mod error;
pub mod model;
pub mod router;
pub mod session;
pub mod signals;
pub mod upload;
pub mod validation;
pub mod view;

pub use api::{ApiClient, DownloadedFile};
pub use config::ClientConfig;
pub use coordinator::{MailApi, MutationCoordinator, MutationOutcome, Rollback};
pub use error::{Error, Result};
pub use model::{
    AttachmentDescriptor, Condition, Contact, ContactField, ContactSort, Email, EmailPage, Filter,
    FilterAction, Folder, FolderKind, MatchField, Matcher, MessageId, OutgoingEmail, OutgoingFile,
    SearchField, SortBy, system,
};
pub use router::{EventRouter, RouteAction};
pub use session::{
    KeyringSessionStore, MemorySessionStore, Session, SessionGate, SessionStore,
};
pub use signals::{
    LogoutReason, Notification, NotificationKind, RefreshReason, Signal, Signals, Subscription,
};
pub use upload::{AttachmentApi, UploadMode, UploadPipeline, UploadProgress, UploadProgressHandle};
pub use validation::{ValidationError, ValidationResult};
pub use view::{Flag, MailboxView, Navigator, NoopNavigator, Removal};

pub use jaryn_push::{PushConfig, PushEvent, PushEventKind};
