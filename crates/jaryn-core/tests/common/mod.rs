//! In-memory fakes shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jaryn_core::{
    AttachmentApi, AttachmentDescriptor, Email, EmailPage, Error, MailApi, MailboxView, MessageId,
    MutationCoordinator, Navigator, OutgoingEmail, OutgoingFile, Result, Signals, SortBy,
};

/// Fails a named operation with a status code.
fn failure(status: u16) -> Error {
    if status == 401 {
        Error::Unauthorized
    } else {
        Error::server(status, None)
    }
}

#[derive(Default)]
pub struct FakeMail {
    pub calls: Mutex<Vec<String>>,
    pub failures: Mutex<HashMap<&'static str, u16>>,
    pub delays: Mutex<HashMap<&'static str, Duration>>,
    pub pages: Mutex<HashMap<String, EmailPage>>,
    pub emails: Mutex<HashMap<MessageId, Email>>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
    /// Server-side starred flags, written by successful calls only.
    pub starred: Mutex<HashMap<MessageId, bool>>,
    /// Server-side read flags, written by successful calls only.
    pub read: Mutex<HashMap<MessageId, bool>>,
    next_id: AtomicUsize,
}

impl FakeMail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str, status: u16) {
        self.failures.lock().unwrap().insert(op, status);
    }

    pub fn delay(&self, op: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(op, delay);
    }

    pub fn with_page(self, folder: &str, emails: Vec<Email>) -> Self {
        let page = EmailPage {
            total_emails: emails.len() as u64,
            content: emails,
            current_page: 1,
            page_size: 20,
            total_pages: 1,
            folder: Some(folder.to_string()),
        };
        self.pages.lock().unwrap().insert(folder.to_string(), page);
        self
    }

    pub fn with_email(self, email: Email) -> Self {
        self.emails
            .lock()
            .unwrap()
            .insert(email.message_id.clone(), email);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(op)).count()
    }

    pub fn starred_on_server(&self, id: &str) -> Option<bool> {
        self.starred.lock().unwrap().get(&MessageId::new(id)).copied()
    }

    pub fn read_on_server(&self, id: &str) -> Option<bool> {
        self.read.lock().unwrap().get(&MessageId::new(id)).copied()
    }

    async fn record(&self, op: &'static str, detail: String) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{op} {detail}"));
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let status = self.failures.lock().unwrap().get(op).copied();
        status.map_or(Ok(()), |status| Err(failure(status)))
    }
}

fn ids(ids: &[MessageId]) -> String {
    ids.iter().map(MessageId::as_str).collect::<Vec<_>>().join(",")
}

impl MailApi for FakeMail {
    async fn list_folder(&self, folder: &str, page: u32, _sort: SortBy) -> Result<EmailPage> {
        self.record("list_folder", format!("{folder} {page}")).await?;
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(folder)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_email(&self, id: &MessageId) -> Result<Email> {
        self.record("get_email", id.to_string()).await?;
        self.emails
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::server(404, None))
    }

    async fn set_read(&self, id: &MessageId, read: bool) -> Result<()> {
        self.record("set_read", format!("{id} {read}")).await?;
        self.read.lock().unwrap().insert(id.clone(), read);
        Ok(())
    }

    async fn set_starred(&self, id: &MessageId, starred: bool) -> Result<()> {
        self.record("set_starred", format!("{id} {starred}")).await?;
        self.starred.lock().unwrap().insert(id.clone(), starred);
        Ok(())
    }

    async fn move_email(&self, id: &MessageId, folder: &str) -> Result<()> {
        self.record("move_email", format!("{id} {folder}")).await
    }

    async fn delete_email(&self, id: &MessageId) -> Result<()> {
        self.record("delete_email", id.to_string()).await
    }

    async fn bulk_move(&self, list: &[MessageId], folder: &str) -> Result<()> {
        self.record("bulk_move", format!("{} {folder}", ids(list))).await
    }

    async fn bulk_delete(&self, list: &[MessageId]) -> Result<()> {
        self.record("bulk_delete", ids(list)).await
    }

    async fn bulk_restore(&self, list: &[MessageId]) -> Result<()> {
        self.record("bulk_restore", ids(list)).await
    }

    async fn permanent_delete(&self, list: &[MessageId]) -> Result<()> {
        self.record("permanent_delete", ids(list)).await
    }

    async fn send_email(&self, email: &OutgoingEmail) -> Result<MessageId> {
        self.record("send_email", email.subject.clone()).await?;
        self.sent.lock().unwrap().push(email.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageId::new(format!("sent-{n}")))
    }

    async fn save_draft(&self, email: &OutgoingEmail) -> Result<MessageId> {
        self.record("save_draft", email.subject.clone()).await?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageId::new(format!("draft-{n}")))
    }

    async fn send_draft(&self, id: &MessageId) -> Result<()> {
        self.record("send_draft", id.to_string()).await
    }
}

/// Attachment server that stores uploads in memory.
#[derive(Default)]
pub struct FakeAttachments {
    pub reserved: AtomicUsize,
    pub uploads: Mutex<Vec<(Option<String>, AttachmentDescriptor)>>,
    pub fail_file: Mutex<Option<String>>,
    pub fail_reserve: Mutex<bool>,
    pub upload_delay: Mutex<Option<Duration>>,
}

impl FakeAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upload_of(&self, file_name: &str) {
        *self.fail_file.lock().unwrap() = Some(file_name.to_string());
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| d.file_name.clone())
            .collect();
        names.sort();
        names
    }
}

impl AttachmentApi for FakeAttachments {
    async fn reserve_id(&self) -> Result<String> {
        if *self.fail_reserve.lock().unwrap() {
            return Err(Error::server(503, None));
        }
        let n = self.reserved.fetch_add(1, Ordering::SeqCst);
        Ok(format!("att-{n}"))
    }

    async fn upload(
        &self,
        id: Option<&str>,
        file: &OutgoingFile,
        accessors: &[String],
    ) -> Result<AttachmentDescriptor> {
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_file.lock().unwrap().as_deref() == Some(file.file_name.as_str()) {
            return Err(Error::server(409, Some("MIME type mismatch".to_string())));
        }
        let descriptor = AttachmentDescriptor {
            id: id.map_or_else(|| format!("srv-{}", file.file_name), ToString::to_string),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            accessors: accessors.to_vec(),
        };
        self.uploads
            .lock()
            .unwrap()
            .push((id.map(ToString::to_string), descriptor.clone()));
        Ok(descriptor)
    }
}

/// Counts back-navigations.
#[derive(Default)]
pub struct CountingNavigator {
    pub backs: AtomicUsize,
}

impl CountingNavigator {
    pub fn backs(&self) -> usize {
        self.backs.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn back(&self) {
        self.backs.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn email(id: &str, subject: &str) -> Email {
    Email::new(id, subject)
}

pub struct Harness {
    pub api: Arc<FakeMail>,
    pub view: Arc<Mutex<MailboxView>>,
    pub signals: Signals,
    pub navigator: Arc<CountingNavigator>,
    pub coordinator: MutationCoordinator<FakeMail>,
}

impl Harness {
    pub fn new(api: FakeMail) -> Self {
        let api = Arc::new(api);
        let view = Arc::new(Mutex::new(MailboxView::new("inbox")));
        let signals = Signals::new();
        let navigator = Arc::new(CountingNavigator::default());
        let coordinator = MutationCoordinator::new(
            Arc::clone(&api),
            Arc::clone(&view),
            signals.clone(),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        );
        Self {
            api,
            view,
            signals,
            navigator,
            coordinator,
        }
    }

    /// Harness whose inbox already shows `emails`.
    pub async fn with_inbox(emails: Vec<Email>) -> Self {
        let harness = Self::new(FakeMail::new().with_page("inbox", emails));
        harness
            .coordinator
            .load_page(1, SortBy::Date)
            .await
            .unwrap();
        harness
    }
}
