//! Optimistic mutation coordinator.
//!
//! Flag toggles (star, read) are optimistic-first: the view changes at once
//! and a rollback closure captured before the request restores the prior
//! value if the server refuses. Destructive and bulk actions are
//! confirm-first: the view is untouched until the server succeeds, then the
//! affected items leave the list and the selection, and an open message among
//! them is closed with exactly one back-navigation.
//!
//! Every response is checked against the view generation captured when the
//! action started; a response for a folder the user has left is not applied.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::model::{Email, EmailPage, MessageId, OutgoingEmail, SortBy};
use crate::signals::{RefreshReason, Signals};
use crate::validation::{ValidationError, validate_draft, validate_outgoing};
use crate::view::{Flag, MailboxView, Navigator};
use crate::{Error, Result};

/// Mail operations the coordinator drives.
pub trait MailApi: Send + Sync {
    /// Lists a page of a folder.
    fn list_folder(
        &self,
        folder: &str,
        page: u32,
        sort: SortBy,
    ) -> impl Future<Output = Result<EmailPage>> + Send;

    /// Fetches a message; the server marks it read.
    fn get_email(&self, id: &MessageId) -> impl Future<Output = Result<Email>> + Send;

    /// Sets the read flag.
    fn set_read(&self, id: &MessageId, read: bool) -> impl Future<Output = Result<()>> + Send;

    /// Sets the star flag.
    fn set_starred(&self, id: &MessageId, starred: bool)
    -> impl Future<Output = Result<()>> + Send;

    /// Moves one message.
    fn move_email(&self, id: &MessageId, folder: &str) -> impl Future<Output = Result<()>> + Send;

    /// Deletes one message.
    fn delete_email(&self, id: &MessageId) -> impl Future<Output = Result<()>> + Send;

    /// Moves several messages atomically.
    fn bulk_move(&self, ids: &[MessageId], folder: &str)
    -> impl Future<Output = Result<()>> + Send;

    /// Deletes several messages atomically.
    fn bulk_delete(&self, ids: &[MessageId]) -> impl Future<Output = Result<()>> + Send;

    /// Restores several messages from trash atomically.
    fn bulk_restore(&self, ids: &[MessageId]) -> impl Future<Output = Result<()>> + Send;

    /// Permanently deletes several messages atomically.
    fn permanent_delete(&self, ids: &[MessageId]) -> impl Future<Output = Result<()>> + Send;

    /// Sends a message.
    fn send_email(&self, email: &OutgoingEmail) -> impl Future<Output = Result<MessageId>> + Send;

    /// Saves a draft.
    fn save_draft(&self, email: &OutgoingEmail) -> impl Future<Output = Result<MessageId>> + Send;

    /// Sends a saved draft.
    fn send_draft(&self, id: &MessageId) -> impl Future<Output = Result<()>> + Send;
}

impl MailApi for ApiClient {
    async fn list_folder(&self, folder: &str, page: u32, sort: SortBy) -> Result<EmailPage> {
        Self::list_folder(self, folder, page, sort).await
    }

    async fn get_email(&self, id: &MessageId) -> Result<Email> {
        Self::get_email(self, id).await
    }

    async fn set_read(&self, id: &MessageId, read: bool) -> Result<()> {
        Self::set_read(self, id, read).await
    }

    async fn set_starred(&self, id: &MessageId, starred: bool) -> Result<()> {
        Self::set_starred(self, id, starred).await
    }

    async fn move_email(&self, id: &MessageId, folder: &str) -> Result<()> {
        Self::move_email(self, id, folder).await
    }

    async fn delete_email(&self, id: &MessageId) -> Result<()> {
        Self::delete_email(self, id).await
    }

    async fn bulk_move(&self, ids: &[MessageId], folder: &str) -> Result<()> {
        Self::bulk_move(self, ids, folder).await
    }

    async fn bulk_delete(&self, ids: &[MessageId]) -> Result<()> {
        Self::bulk_delete(self, ids).await
    }

    async fn bulk_restore(&self, ids: &[MessageId]) -> Result<()> {
        Self::bulk_restore(self, ids).await
    }

    async fn permanent_delete(&self, ids: &[MessageId]) -> Result<()> {
        Self::permanent_delete(self, ids).await
    }

    async fn send_email(&self, email: &OutgoingEmail) -> Result<MessageId> {
        Self::send_email(self, email).await
    }

    async fn save_draft(&self, email: &OutgoingEmail) -> Result<MessageId> {
        Self::save_draft(self, email).await
    }

    async fn send_draft(&self, id: &MessageId) -> Result<()> {
        Self::send_draft(self, id).await
    }
}

/// When a successful mutation became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Shown before the server answered (optimistic-first).
    AppliedBeforeConfirmation,
    /// Shown once the server confirmed (confirm-first).
    AppliedAfterConfirmation,
}

/// Undoes an optimistic change.
pub type Rollback = Box<dyn FnOnce(&mut MailboxView) + Send>;

/// Applies user actions to the server and the local view.
pub struct MutationCoordinator<A: MailApi> {
    api: Arc<A>,
    view: Arc<Mutex<MailboxView>>,
    signals: Signals,
    navigator: Arc<dyn Navigator>,
}

impl<A: MailApi> MutationCoordinator<A> {
    /// Creates a coordinator over a shared view.
    pub fn new(
        api: Arc<A>,
        view: Arc<Mutex<MailboxView>>,
        signals: Signals,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api,
            view,
            signals,
            navigator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MailboxView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with the view locked. Keep `f` short.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut MailboxView) -> R) -> R {
        f(&mut self.lock())
    }

    /// A copy of the current view.
    #[must_use]
    pub fn snapshot(&self) -> MailboxView {
        self.lock().clone()
    }

    /// Surfaces an error to the user. Auth failures are left to the logout
    /// flow.
    fn report(&self, action: &str, error: &Error) {
        warn!("{} failed: {}", action, error);
        if !error.is_auth() {
            self.signals.notify_error(error.user_message());
        }
    }

    // Optimistic-first

    /// Stars or unstars a message. Repeating the same call is harmless.
    ///
    /// # Errors
    ///
    /// Returns the request error after restoring the prior flag.
    pub async fn set_starred(&self, id: &MessageId, starred: bool) -> Result<MutationOutcome> {
        let request = self.api.set_starred(id, starred);
        self.apply_optimistic("Star", id, Flag::Starred, starred, request)
            .await
    }

    /// Flips the star flag of a message in view.
    ///
    /// # Errors
    ///
    /// Returns the request error after restoring the prior flag.
    pub async fn toggle_star(&self, id: &MessageId) -> Result<MutationOutcome> {
        let starred = !self.lock().flag(id, Flag::Starred).unwrap_or(false);
        self.set_starred(id, starred).await
    }

    /// Marks a message read or unread.
    ///
    /// # Errors
    ///
    /// Returns the request error after restoring the prior flag.
    pub async fn mark_read(&self, id: &MessageId, read: bool) -> Result<MutationOutcome> {
        let request = self.api.set_read(id, read);
        let outcome = self
            .apply_optimistic("Mark read", id, Flag::Read, read, request)
            .await?;
        if read {
            self.signals.message_read.emit(id.clone());
        }
        self.signals.unread_count.emit(());
        Ok(outcome)
    }

    async fn apply_optimistic(
        &self,
        action: &str,
        id: &MessageId,
        flag: Flag,
        value: bool,
        request: impl Future<Output = Result<()>>,
    ) -> Result<MutationOutcome> {
        let (generation, rollback) = {
            let mut view = self.lock();
            let previous = view.set_flag(id, flag, value);
            let id = id.clone();
            let rollback: Rollback = Box::new(move |view: &mut MailboxView| {
                if let Some(previous) = previous {
                    view.set_flag(&id, flag, previous);
                }
            });
            (view.generation(), rollback)
        };

        match request.await {
            Ok(()) => Ok(MutationOutcome::AppliedBeforeConfirmation),
            Err(e) => {
                {
                    let mut view = self.lock();
                    if view.generation() == generation {
                        rollback(&mut view);
                    }
                }
                self.report(action, &e);
                Err(e)
            }
        }
    }

    // Confirm-first

    /// Deletes one message.
    ///
    /// # Errors
    ///
    /// Returns the request error; the view is unchanged.
    pub async fn delete(&self, id: &MessageId) -> Result<MutationOutcome> {
        let ids = std::slice::from_ref(id);
        self.apply_confirmed("Delete", ids, false, self.api.delete_email(id))
            .await?;
        self.signals.notify_success("Email deleted");
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Moves one message to another folder.
    ///
    /// # Errors
    ///
    /// Returns the request error; the view is unchanged.
    pub async fn move_to(&self, id: &MessageId, folder: &str) -> Result<MutationOutcome> {
        let ids = std::slice::from_ref(id);
        self.apply_confirmed("Move", ids, false, self.api.move_email(id, folder))
            .await?;
        self.signals.list_refresh.emit(RefreshReason::Local);
        self.signals.notify_success(format!("Moved to {folder}"));
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Deletes several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list, else the request error;
    /// the view is unchanged on error.
    pub async fn bulk_delete(&self, ids: &[MessageId]) -> Result<MutationOutcome> {
        non_empty(ids)?;
        self.apply_confirmed("Bulk delete", ids, true, self.api.bulk_delete(ids))
            .await?;
        self.signals
            .notify_success(format!("Deleted {} email(s)", ids.len()));
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Moves several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list, else the request error;
    /// the view is unchanged on error.
    pub async fn bulk_move(&self, ids: &[MessageId], folder: &str) -> Result<MutationOutcome> {
        non_empty(ids)?;
        self.apply_confirmed("Bulk move", ids, true, self.api.bulk_move(ids, folder))
            .await?;
        self.signals.list_refresh.emit(RefreshReason::Local);
        self.signals
            .notify_success(format!("Moved {} email(s) to {folder}", ids.len()));
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Restores several messages from trash in one request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list, else the request error;
    /// the view is unchanged on error.
    pub async fn bulk_restore(&self, ids: &[MessageId]) -> Result<MutationOutcome> {
        non_empty(ids)?;
        self.apply_confirmed("Restore", ids, true, self.api.bulk_restore(ids))
            .await?;
        self.signals.list_refresh.emit(RefreshReason::Local);
        self.signals
            .notify_success(format!("Restored {} email(s)", ids.len()));
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Permanently deletes several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list, else the request error;
    /// the view is unchanged on error.
    pub async fn permanent_delete(&self, ids: &[MessageId]) -> Result<MutationOutcome> {
        non_empty(ids)?;
        self.apply_confirmed("Permanent delete", ids, true, self.api.permanent_delete(ids))
            .await?;
        self.signals
            .notify_success(format!("Permanently deleted {} email(s)", ids.len()));
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }

    /// Deletes the selected messages.
    ///
    /// # Errors
    ///
    /// See [`Self::bulk_delete`].
    pub async fn delete_selected(&self) -> Result<MutationOutcome> {
        let ids = self.lock().selected();
        self.bulk_delete(&ids).await
    }

    /// Moves the selected messages.
    ///
    /// # Errors
    ///
    /// See [`Self::bulk_move`].
    pub async fn move_selected(&self, folder: &str) -> Result<MutationOutcome> {
        let ids = self.lock().selected();
        self.bulk_move(&ids, folder).await
    }

    async fn apply_confirmed(
        &self,
        action: &str,
        ids: &[MessageId],
        clear_selection: bool,
        request: impl Future<Output = Result<()>>,
    ) -> Result<()> {
        let generation = self.lock().generation();

        if let Err(e) = request.await {
            self.report(action, &e);
            return Err(e);
        }

        let removal = {
            let mut view = self.lock();
            (view.generation() == generation).then(|| {
                let removal = view.remove(ids);
                if clear_selection {
                    view.clear_selection();
                }
                removal
            })
        };

        match removal {
            Some(removal) => {
                debug!("{} removed {} item(s) from view", action, removal.removed);
                self.signals.selection_clear.emit(());
                if removal.detail_cleared {
                    self.navigator.back();
                }
            }
            None => debug!("{} confirmed after navigation; view left as is", action),
        }
        self.signals.unread_count.emit(());
        Ok(())
    }

    // Loading and compose

    /// Opens a message: fetches it, shows it and marks the list item read.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn open_message(&self, id: &MessageId) -> Result<Email> {
        let generation = self.lock().generation();
        let mut email = match self.api.get_email(id).await {
            Ok(email) => email,
            Err(e) => {
                self.report("Open message", &e);
                return Err(e);
            }
        };

        let was_unread = !email.is_read;
        email.is_read = true;
        {
            let mut view = self.lock();
            if view.generation() == generation {
                view.set_flag(id, Flag::Read, true);
                view.open_detail(email.clone());
            }
        }
        if was_unread {
            self.signals.message_read.emit(id.clone());
            self.signals.unread_count.emit(());
        }
        Ok(email)
    }

    /// Switches the view to `folder` and loads its first page.
    ///
    /// # Errors
    ///
    /// Returns the request error; the view stays on the new, empty folder.
    pub async fn open_folder(&self, folder: &str, sort: SortBy) -> Result<()> {
        self.lock().navigate(folder);
        self.load_page(1, sort).await
    }

    /// Loads a page of the current folder.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn load_page(&self, page: u32, sort: SortBy) -> Result<()> {
        let (folder, generation) = {
            let view = self.lock();
            (view.folder().to_string(), view.generation())
        };

        let listing = match self.api.list_folder(&folder, page, sort).await {
            Ok(listing) => listing,
            Err(e) => {
                self.report("Load folder", &e);
                return Err(e);
            }
        };

        let mut view = self.lock();
        if view.generation() == generation {
            view.replace_page(listing);
        } else {
            debug!("Discarding page of {} loaded after navigation", folder);
        }
        Ok(())
    }

    /// Reloads the current page.
    ///
    /// # Errors
    ///
    /// Returns the request error.
    pub async fn refresh(&self, sort: SortBy) -> Result<()> {
        let page = self.lock().page();
        self.load_page(page, sort).await
    }

    /// Validates and sends a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without sending, or the request error.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<MessageId> {
        if let Err(errors) = validate_outgoing(email) {
            let error = Error::Validation(errors);
            self.report("Send", &error);
            return Err(error);
        }
        match self.api.send_email(email).await {
            Ok(id) => {
                info!("Message {} sent", id);
                self.signals.notify_success("Email sent");
                Ok(id)
            }
            Err(e) => {
                self.report("Send", &e);
                Err(e)
            }
        }
    }

    /// Saves a draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without saving, or the request error.
    pub async fn save_draft(&self, email: &OutgoingEmail) -> Result<MessageId> {
        if let Err(errors) = validate_draft(email) {
            let error = Error::Validation(errors);
            self.report("Save draft", &error);
            return Err(error);
        }
        match self.api.save_draft(email).await {
            Ok(id) => {
                self.signals.notify_success("Draft saved");
                Ok(id)
            }
            Err(e) => {
                self.report("Save draft", &e);
                Err(e)
            }
        }
    }

    /// Sends a saved draft and removes it from the drafts list.
    ///
    /// # Errors
    ///
    /// Returns the request error; the view is unchanged.
    pub async fn send_draft(&self, id: &MessageId) -> Result<MutationOutcome> {
        let ids = std::slice::from_ref(id);
        self.apply_confirmed("Send draft", ids, false, self.api.send_draft(id))
            .await?;
        self.signals.notify_success("Email sent");
        Ok(MutationOutcome::AppliedAfterConfirmation)
    }
}

fn non_empty(ids: &[MessageId]) -> Result<()> {
    if ids.is_empty() {
        Err(Error::Validation(vec![ValidationError::EmptySelection]))
    } else {
        Ok(())
    }
}
