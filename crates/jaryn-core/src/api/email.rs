//! Email endpoints.

use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use super::ApiClient;
use crate::Result;
use crate::model::{Email, EmailPage, MessageId, OutgoingEmail, SearchField, SortBy, system};

#[derive(Debug, Deserialize)]
struct UnreadCount {
    #[serde(rename = "unreadCount")]
    unread_count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<Email>,
}

#[derive(Debug, Deserialize)]
struct Starred {
    #[serde(default)]
    emails: Vec<Email>,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(rename = "messageId")]
    message_id: MessageId,
}

fn listing_query(page: u32, limit: u32, sort: SortBy) -> [(&'static str, String); 3] {
    [
        ("page", page.max(1).to_string()),
        ("limit", limit.to_string()),
        ("sortBy", sort.as_str().to_string()),
    ]
}

fn id_list(ids: &[MessageId]) -> Vec<&str> {
    ids.iter().map(MessageId::as_str).collect()
}

impl ApiClient {
    /// Lists a page of a folder. Pages are 1-based.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_folder(&self, folder: &str, page: u32, sort: SortBy) -> Result<EmailPage> {
        let query = listing_query(page, self.config.page_size, sort);
        if folder.eq_ignore_ascii_case(system::INBOX) {
            self.get_json(&["api", "email", "inbox"], &query).await
        } else if folder.eq_ignore_ascii_case(system::STARRED) {
            self.starred(sort).await.map(|emails| EmailPage {
                total_emails: emails.len() as u64,
                page_size: u32::try_from(emails.len()).unwrap_or(u32::MAX),
                current_page: 1,
                total_pages: 1,
                folder: Some(system::STARRED.to_string()),
                content: emails,
            })
        } else {
            self.get_json(&["api", "email", "folder", folder], &query)
                .await
        }
    }

    /// Lists starred messages across folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn starred(&self, sort: SortBy) -> Result<Vec<Email>> {
        let body: Starred = self
            .get_json(&["api", "email", "starred"], &[(
                "sortBy",
                sort.as_str().to_string(),
            )])
            .await?;
        Ok(body.emails)
    }

    /// Fetches one message. The server marks it read.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the message does not exist.
    pub async fn get_email(&self, id: &MessageId) -> Result<Email> {
        self.get_json(&["api", "email", id.as_str()], &[]).await
    }

    /// Searches messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn search(
        &self,
        keyword: &str,
        field: SearchField,
        sort: Option<SortBy>,
    ) -> Result<Vec<Email>> {
        let mut query = vec![
            ("keyword", keyword.to_string()),
            ("searchBy", field.as_str().to_string()),
        ];
        if let Some(sort) = sort {
            query.push(("sortBy", sort.as_str().to_string()));
        }
        let body: SearchResults = self.get_json(&["api", "email", "search"], &query).await?;
        Ok(body.results)
    }

    /// Number of unread messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn unread_count(&self) -> Result<u64> {
        let body: UnreadCount = self
            .get_json(&["api", "email", "unread-count"], &[])
            .await?;
        Ok(body.unread_count)
    }

    /// Sends a message; returns the new message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_email(&self, email: &OutgoingEmail) -> Result<MessageId> {
        let created: Created = self
            .send_json(Method::POST, &["api", "email", "send"], email)
            .await?;
        info!(
            "Sent message {} with {} attachment(s)",
            created.message_id,
            email.attachments.len()
        );
        Ok(created.message_id)
    }

    /// Saves a draft; returns its message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn save_draft(&self, email: &OutgoingEmail) -> Result<MessageId> {
        let created: Created = self
            .send_json(Method::POST, &["api", "email", "draft"], email)
            .await?;
        Ok(created.message_id)
    }

    /// Sends a previously saved draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_draft(&self, id: &MessageId) -> Result<()> {
        self.call(Method::POST, &["api", "email", id.as_str(), "send-draft"], &[])
            .await
    }

    /// Sets or clears the read flag. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn set_read(&self, id: &MessageId, read: bool) -> Result<()> {
        let action = if read { "read" } else { "unread" };
        self.call(Method::PUT, &["api", "email", id.as_str(), action], &[])
            .await
    }

    /// Sets or clears the star flag. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn set_starred(&self, id: &MessageId, starred: bool) -> Result<()> {
        let action = if starred { "star" } else { "unstar" };
        self.call(Method::PUT, &["api", "email", id.as_str(), action], &[])
            .await
    }

    /// Moves one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn move_email(&self, id: &MessageId, folder: &str) -> Result<()> {
        self.call(Method::PUT, &["api", "email", id.as_str(), "move"], &[(
            "toFolder",
            folder.to_string(),
        )])
        .await
    }

    /// Deletes one message (to trash, or permanently from trash).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_email(&self, id: &MessageId) -> Result<()> {
        self.call(Method::DELETE, &["api", "email", id.as_str()], &[])
            .await
    }

    /// Moves several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn bulk_move(&self, ids: &[MessageId], folder: &str) -> Result<()> {
        self.send_json_unit(
            Method::POST,
            &["api", "email", "bulk-move"],
            &[("toFolder", folder.to_string())],
            &id_list(ids),
        )
        .await
    }

    /// Deletes several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn bulk_delete(&self, ids: &[MessageId]) -> Result<()> {
        self.send_json_unit(Method::POST, &["api", "email", "bulk-delete"], &[], &id_list(ids))
            .await
    }

    /// Restores several messages from trash in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn bulk_restore(&self, ids: &[MessageId]) -> Result<()> {
        self.send_json_unit(Method::POST, &["api", "email", "bulk-restore"], &[], &id_list(ids))
            .await
    }

    /// Permanently deletes several messages in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn permanent_delete(&self, ids: &[MessageId]) -> Result<()> {
        self.send_json_unit(
            Method::POST,
            &["api", "email", "permanent-delete"],
            &[],
            &id_list(ids),
        )
        .await
    }
}
