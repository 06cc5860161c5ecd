//! Attachment upload pipeline.
//!
//! Two ways to send a message with attachments:
//!
//! - [`UploadMode::NonTransactional`]: one id is reserved per file (all
//!   reservations in flight together), the ids go on the message at once and
//!   the bytes upload in detached tasks while the message is submitted. The
//!   tasks outlive the pipeline. A failed background upload is logged and
//!   counted, nothing more.
//! - [`UploadMode::Transactional`]: every file is uploaded first and the
//!   server's descriptors go on the message. Any failure abandons the send.
//!   The send is held back until a minimum duration has passed so the
//!   progress display does not flash.
//!
//! Progress for the current batch is published on a `watch` channel through
//! [`UploadProgressHandle`]. The outcome of each send is published on
//! [`Signals::notifications`], as the mutation coordinator does for its sends.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::coordinator::MailApi;
use crate::model::{AttachmentDescriptor, MessageId, OutgoingEmail, OutgoingFile};
use crate::signals::Signals;
use crate::validation::validate_outgoing;
use crate::{Error, Result};

/// Attachment operations the pipeline drives.
pub trait AttachmentApi: Send + Sync + 'static {
    /// Reserves an attachment id.
    fn reserve_id(&self) -> impl Future<Output = Result<String>> + Send;

    /// Uploads `file`, under `id` if one was reserved.
    fn upload(
        &self,
        id: Option<&str>,
        file: &OutgoingFile,
        accessors: &[String],
    ) -> impl Future<Output = Result<AttachmentDescriptor>> + Send;
}

impl AttachmentApi for ApiClient {
    async fn reserve_id(&self) -> Result<String> {
        self.reserve_attachment_id().await
    }

    async fn upload(
        &self,
        id: Option<&str>,
        file: &OutgoingFile,
        accessors: &[String],
    ) -> Result<AttachmentDescriptor> {
        self.upload_attachment(id, file, accessors).await
    }
}

/// How attachments are tied to the send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadMode {
    /// Reserve ids, send at once, upload in the background.
    #[default]
    NonTransactional,
    /// Upload everything, then send.
    Transactional,
}

/// Progress of the current upload batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadProgress {
    /// Files uploaded.
    pub completed: usize,
    /// Files that failed.
    pub failed: usize,
    /// Files in the batch.
    pub total: usize,
    /// A batch is running.
    pub in_progress: bool,
}

impl UploadProgress {
    /// Files still uploading.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed + self.failed)
    }
}

/// Shared, observable upload progress.
#[derive(Debug, Clone)]
pub struct UploadProgressHandle {
    sender: Arc<watch::Sender<UploadProgress>>,
}

impl UploadProgressHandle {
    /// Creates an idle progress holder.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(UploadProgress::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Starts a batch of `total` files.
    pub fn begin(&self, total: usize) {
        self.sender.send_replace(UploadProgress {
            completed: 0,
            failed: 0,
            total,
            in_progress: total > 0,
        });
    }

    /// Records a finished upload.
    pub fn complete_one(&self) {
        self.sender.send_modify(|p| {
            p.completed += 1;
            p.in_progress = p.remaining() > 0;
        });
    }

    /// Records a failed upload.
    pub fn fail_one(&self) {
        self.sender.send_modify(|p| {
            p.failed += 1;
            p.in_progress = p.remaining() > 0;
        });
    }

    /// Ends the batch early.
    pub fn finish(&self) {
        self.sender.send_if_modified(|p| std::mem::replace(&mut p.in_progress, false));
    }

    /// Current progress.
    #[must_use]
    pub fn current(&self) -> UploadProgress {
        *self.sender.borrow()
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.sender.subscribe()
    }
}

impl Default for UploadProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// One background upload's slot in the batch.
///
/// A task dropped before it settles (aborted, or its runtime shut down)
/// counts as failed so the batch still ends.
struct Settle {
    progress: UploadProgressHandle,
    settled: bool,
}

impl Settle {
    const fn new(progress: UploadProgressHandle) -> Self {
        Self {
            progress,
            settled: false,
        }
    }

    fn complete(mut self) {
        self.settled = true;
        self.progress.complete_one();
    }

    fn fail(mut self) {
        self.settled = true;
        self.progress.fail_one();
    }
}

impl Drop for Settle {
    fn drop(&mut self) {
        if !self.settled {
            self.progress.fail_one();
        }
    }
}

/// Uploads attachments and submits the message that references them.
pub struct UploadPipeline<A: AttachmentApi> {
    api: Arc<A>,
    progress: UploadProgressHandle,
    signals: Signals,
    min_send_duration: Duration,
    /// Detached background uploads; dropping a handle does not cancel its task.
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<A: AttachmentApi> UploadPipeline<A> {
    /// Creates a pipeline.
    ///
    /// `min_send_duration` paces transactional sends; zero disables it.
    pub fn new(
        api: Arc<A>,
        progress: UploadProgressHandle,
        signals: Signals,
        min_send_duration: Duration,
    ) -> Self {
        Self {
            api,
            progress,
            signals,
            min_send_duration,
            background: Mutex::new(Vec::new()),
        }
    }

    /// Progress holder shared with observers.
    pub const fn progress(&self) -> &UploadProgressHandle {
        &self.progress
    }

    /// Sends `email` with `files` attached.
    ///
    /// `sender` is the signed-in user's address; it and the recipients become
    /// the attachments' accessors. Success and failure are both announced on
    /// the notification signal; authentication failures are left to the
    /// logout flow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any request, the reservation
    /// error in non-transactional mode, [`Error::Upload`] when a
    /// transactional upload fails, or the send error.
    pub async fn send<M: MailApi>(
        &self,
        mail: &M,
        email: OutgoingEmail,
        files: Vec<OutgoingFile>,
        sender: &str,
        mode: UploadMode,
    ) -> Result<MessageId> {
        match self.submit(mail, email, files, sender, mode).await {
            Ok(id) => {
                self.signals.notify_success("Email sent");
                Ok(id)
            }
            Err(e) => {
                warn!("Send with attachments failed: {}", e);
                if !e.is_auth() {
                    self.signals.notify_error(e.user_message());
                }
                Err(e)
            }
        }
    }

    /// Waits for every background upload started so far to finish.
    ///
    /// Optional: the uploads run to completion whether or not anyone waits.
    pub async fn flush(&self) {
        let pending = {
            let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *background)
        };
        for handle in pending {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                warn!("Background upload panicked: {}", e);
            }
        }
    }

    async fn submit<M: MailApi>(
        &self,
        mail: &M,
        mut email: OutgoingEmail,
        files: Vec<OutgoingFile>,
        sender: &str,
        mode: UploadMode,
    ) -> Result<MessageId> {
        validate_outgoing(&email).map_err(Error::Validation)?;

        if !files.is_empty() {
            let accessors = email.accessors(sender);
            match mode {
                UploadMode::NonTransactional => {
                    let ids = self.reserve_ids(files.len()).await?;
                    email.attachments.extend(
                        ids.iter()
                            .zip(&files)
                            .map(|(id, file)| AttachmentDescriptor::reserved(id.as_str(), file, &accessors)),
                    );
                    self.spawn_uploads(ids, files, &accessors);
                }
                UploadMode::Transactional => {
                    let deadline = tokio::time::Instant::now() + self.min_send_duration;
                    let descriptors = self.upload_all(files, &accessors).await?;
                    email.attachments.extend(descriptors);
                    tokio::time::sleep_until(deadline).await;
                }
            }
        }

        let id = mail.send_email(&email).await?;
        info!(
            "Sent {} with {} attachment(s) ({:?})",
            id,
            email.attachments.len(),
            mode
        );
        Ok(id)
    }

    async fn reserve_ids(&self, count: usize) -> Result<Vec<String>> {
        let mut set = JoinSet::new();
        for index in 0..count {
            let api = Arc::clone(&self.api);
            set.spawn(async move { (index, api.reserve_id().await) });
        }

        let mut ids = vec![String::new(); count];
        while let Some(joined) = set.join_next().await {
            let (index, reserved) = joined.map_err(task_failed)?;
            ids[index] = reserved.inspect_err(|e| warn!("Attachment id reservation failed: {}", e))?;
        }
        debug!("Reserved {} attachment id(s)", count);
        Ok(ids)
    }

    fn spawn_uploads(&self, ids: Vec<String>, files: Vec<OutgoingFile>, accessors: &[String]) {
        self.progress.begin(files.len());
        let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        background.retain(|handle| !handle.is_finished());

        for (id, file) in ids.into_iter().zip(files) {
            let api = Arc::clone(&self.api);
            let slot = Settle::new(self.progress.clone());
            let accessors = accessors.to_vec();
            background.push(tokio::spawn(async move {
                match api.upload(Some(&id), &file, &accessors).await {
                    Ok(_) => slot.complete(),
                    Err(e) => {
                        warn!("Background upload of {} ({}) failed: {}", file.file_name, id, e);
                        slot.fail();
                    }
                }
            }));
        }
    }

    async fn upload_all(
        &self,
        files: Vec<OutgoingFile>,
        accessors: &[String],
    ) -> Result<Vec<AttachmentDescriptor>> {
        self.progress.begin(files.len());
        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();

        let mut set = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let api = Arc::clone(&self.api);
            let accessors = accessors.to_vec();
            set.spawn(async move { (index, api.upload(None, &file, &accessors).await) });
        }

        let mut descriptors: Vec<Option<AttachmentDescriptor>> = vec![None; names.len()];
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(task_failed).and_then(|(index, uploaded)| {
                uploaded
                    .map(|descriptor| descriptors[index] = Some(descriptor))
                    .map_err(|e| Error::Upload(format!("{}: {}", names[index], e)))
            });
            match outcome {
                Ok(()) => self.progress.complete_one(),
                Err(e) => {
                    set.abort_all();
                    self.progress.fail_one();
                    self.progress.finish();
                    warn!("Upload failed, message not sent: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(descriptors.into_iter().flatten().collect())
    }
}

fn task_failed(error: JoinError) -> Error {
    Error::Upload(format!("upload task failed: {error}"))
}
