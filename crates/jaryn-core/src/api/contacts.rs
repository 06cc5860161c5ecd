//! Contact endpoints.

use reqwest::Method;
use serde::Deserialize;

use super::ApiClient;
use crate::model::{Contact, ContactField, ContactSort};
use crate::validation::validate_contact;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct ContactList {
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Debug, Deserialize)]
struct ContactResults {
    #[serde(default, alias = "matches")]
    results: Vec<Contact>,
}

#[derive(Debug, Deserialize)]
struct ContactEnvelope {
    contact: Contact,
}

#[derive(Debug, Deserialize)]
struct ContactCount {
    count: u64,
}

impl ApiClient {
    /// Lists contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_contacts(&self, sort: ContactSort) -> Result<Vec<Contact>> {
        let list: ContactList = self
            .get_json(&["api", "contacts"], &[("sortBy", sort.as_str().to_string())])
            .await?;
        Ok(list.contacts)
    }

    /// Fetches one contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_contact(&self, id: &str) -> Result<Contact> {
        self.get_json(&["api", "contacts", id], &[]).await
    }

    /// Searches contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn search_contacts(
        &self,
        keyword: &str,
        field: ContactField,
        sort: ContactSort,
    ) -> Result<Vec<Contact>> {
        let results: ContactResults = self
            .get_json(&["api", "contacts", "search"], &[
                ("keyword", keyword.to_string()),
                ("searchIn", field.as_str().to_string()),
                ("sortBy", sort.as_str().to_string()),
            ])
            .await?;
        Ok(results.results)
    }

    /// Contacts whose email starts with `prefix`, for address completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn autocomplete(&self, prefix: &str) -> Result<Vec<Contact>> {
        if prefix.trim().is_empty() {
            return Ok(Vec::new());
        }
        let results: ContactResults = self
            .get_json(&["api", "contacts", "autocomplete"], &[(
                "email",
                prefix.trim().to_string(),
            )])
            .await?;
        Ok(results.results)
    }

    /// Number of saved contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn contact_count(&self) -> Result<u64> {
        let count: ContactCount = self.get_json(&["api", "contacts", "count"], &[]).await?;
        Ok(count.count)
    }

    /// Saves a new contact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending if the contact is
    /// incomplete, or a server error (409 for a duplicate).
    pub async fn add_contact(&self, contact: &Contact) -> Result<Contact> {
        validate_contact(contact).map_err(Error::Validation)?;
        let saved: ContactEnvelope = self
            .send_json(Method::POST, &["api", "contacts"], contact)
            .await?;
        Ok(saved.contact)
    }

    /// Updates a saved contact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending if the contact is
    /// incomplete or unsaved, or an error if the request fails.
    pub async fn update_contact(&self, contact: &Contact) -> Result<Contact> {
        validate_contact(contact).map_err(Error::Validation)?;
        let Some(id) = contact.id.as_deref() else {
            return Err(Error::Config("contact has no id".to_string()));
        };
        let saved: ContactEnvelope = self
            .send_json(Method::PUT, &["api", "contacts", id], contact)
            .await?;
        Ok(saved.contact)
    }

    /// Deletes a contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_contact(&self, id: &str) -> Result<()> {
        self.call(Method::DELETE, &["api", "contacts", id], &[])
            .await
    }
}
