//! Local view state: the visible message list, selection and open message.
//!
//! Every navigation bumps the view generation. Async work captures the
//! generation when it starts and only touches the view if it still matches,
//! so a response for a folder the user already left never lands in the new
//! one.

use std::collections::HashSet;

use crate::model::{Email, EmailPage, MessageId};

/// UI navigation hook.
pub trait Navigator: Send + Sync {
    /// Leaves the detail view.
    fn back(&self);
}

/// Navigator for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn back(&self) {}
}

/// A per-message boolean flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Read state.
    Read,
    /// Star state.
    Starred,
}

impl Flag {
    const fn get(self, email: &Email) -> bool {
        match self {
            Self::Read => email.is_read,
            Self::Starred => email.is_starred,
        }
    }

    const fn set(self, email: &mut Email, value: bool) {
        match self {
            Self::Read => email.is_read = value,
            Self::Starred => email.is_starred = value,
        }
    }
}

/// What removing items did to the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    /// List items removed.
    pub removed: usize,
    /// The open message was among them and was closed.
    pub detail_cleared: bool,
}

/// The message list the user is looking at.
#[derive(Debug, Clone)]
pub struct MailboxView {
    folder: String,
    items: Vec<Email>,
    page: u32,
    total_pages: u32,
    total_emails: u64,
    selection: HashSet<MessageId>,
    detail: Option<Email>,
    generation: u64,
}

impl MailboxView {
    /// Creates an empty view of `folder`.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            items: Vec::new(),
            page: 1,
            total_pages: 0,
            total_emails: 0,
            selection: HashSet::new(),
            detail: None,
            generation: 1,
        }
    }

    /// Switches to another folder, discarding list, selection and detail.
    /// Returns the new generation.
    pub fn navigate(&mut self, folder: impl Into<String>) -> u64 {
        self.folder = folder.into();
        self.items.clear();
        self.page = 1;
        self.total_pages = 0;
        self.total_emails = 0;
        self.selection.clear();
        self.detail = None;
        self.generation += 1;
        self.generation
    }

    /// Replaces the list with a freshly loaded page. Selected ids no longer
    /// visible are dropped from the selection.
    pub fn replace_page(&mut self, page: EmailPage) {
        self.page = page.current_page.max(1);
        self.total_pages = page.total_pages;
        self.total_emails = page.total_emails;
        self.items = page.content;

        let visible: HashSet<&MessageId> = self.items.iter().map(|e| &e.message_id).collect();
        self.selection.retain(|id| visible.contains(id));
    }

    /// Sets a flag on the list item and the open message. Returns the prior
    /// value, or `None` if the message is not in view.
    pub fn set_flag(&mut self, id: &MessageId, flag: Flag, value: bool) -> Option<bool> {
        let mut previous = None;
        if let Some(email) = self.items.iter_mut().find(|e| &e.message_id == id) {
            previous = Some(flag.get(email));
            flag.set(email, value);
        }
        if let Some(email) = self.detail.as_mut().filter(|e| &e.message_id == id) {
            previous = previous.or(Some(flag.get(email)));
            flag.set(email, value);
        }
        previous
    }

    /// Current value of a flag, if the message is in view.
    #[must_use]
    pub fn flag(&self, id: &MessageId, flag: Flag) -> Option<bool> {
        self.get(id)
            .or_else(|| self.detail.as_ref().filter(|e| &e.message_id == id))
            .map(|email| flag.get(email))
    }

    /// Removes messages from the list and the selection, closing the detail
    /// view if it shows one of them.
    pub fn remove(&mut self, ids: &[MessageId]) -> Removal {
        let doomed: HashSet<&MessageId> = ids.iter().collect();
        let before = self.items.len();
        self.items.retain(|e| !doomed.contains(&e.message_id));
        let removed = before - self.items.len();
        self.total_emails = self.total_emails.saturating_sub(removed as u64);

        for id in ids {
            self.selection.remove(id);
        }

        let detail_cleared = self
            .detail
            .as_ref()
            .is_some_and(|d| doomed.contains(&d.message_id));
        if detail_cleared {
            self.detail = None;
        }

        Removal {
            removed,
            detail_cleared,
        }
    }

    /// Shows a message in the detail view.
    pub fn open_detail(&mut self, email: Email) {
        self.detail = Some(email);
    }

    /// Closes the detail view.
    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// The open message.
    #[must_use]
    pub const fn detail(&self) -> Option<&Email> {
        self.detail.as_ref()
    }

    /// Adds a visible message to the selection. Returns false if it is not
    /// in the list.
    pub fn select(&mut self, id: &MessageId) -> bool {
        if self.contains(id) {
            self.selection.insert(id.clone());
            true
        } else {
            false
        }
    }

    /// Removes a message from the selection.
    pub fn deselect(&mut self, id: &MessageId) {
        self.selection.remove(id);
    }

    /// Toggles selection of a visible message. Returns the new state.
    pub fn toggle_selected(&mut self, id: &MessageId) -> bool {
        if self.selection.remove(id) {
            false
        } else {
            self.select(id)
        }
    }

    /// Selects every visible message.
    pub fn select_all(&mut self) {
        self.selection = self.items.iter().map(|e| e.message_id.clone()).collect();
    }

    /// Empties the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected ids in list order.
    #[must_use]
    pub fn selected(&self) -> Vec<MessageId> {
        self.items
            .iter()
            .filter(|e| self.selection.contains(&e.message_id))
            .map(|e| e.message_id.clone())
            .collect()
    }

    /// Returns true if the message is selected.
    #[must_use]
    pub fn is_selected(&self, id: &MessageId) -> bool {
        self.selection.contains(id)
    }

    /// Returns true if the message is in the list.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// List item by id.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Email> {
        self.items.iter().find(|e| &e.message_id == id)
    }

    /// Visible messages.
    #[must_use]
    pub fn items(&self) -> &[Email] {
        &self.items
    }

    /// Folder shown.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Current page (1-based).
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Number of pages in the folder.
    #[must_use]
    pub const fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Number of messages in the folder.
    #[must_use]
    pub const fn total_emails(&self) -> u64 {
        self.total_emails
    }

    /// Generation of this view; changes on every navigation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}
