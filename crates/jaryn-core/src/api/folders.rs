//! Folder endpoints.

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::ApiClient;
use crate::model::Folder;
use crate::validation::validate_folder_name;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FolderList {
    #[serde(default)]
    folders: Vec<Folder>,
}

#[derive(Debug, Deserialize)]
struct FolderEnvelope {
    folder: Folder,
}

impl ApiClient {
    /// Lists system and custom folders with their counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        let list: FolderList = self.get_json(&["api", "folders"], &[]).await?;
        Ok(list.folders)
    }

    /// Creates a custom folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending for a bad name, or an
    /// error if the request fails.
    pub async fn create_folder(&self, name: &str) -> Result<Folder> {
        validate_folder_name(name).map_err(Error::Validation)?;
        let created: FolderEnvelope = self
            .send_json(Method::POST, &["api", "folders"], &json!({ "name": name.trim() }))
            .await?;
        info!("Created folder {}", created.folder.name);
        Ok(created.folder)
    }

    /// Renames a custom folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending for a bad name, or an
    /// error if the request fails (system folders are refused by the server).
    pub async fn rename_folder(&self, old_name: &str, new_name: &str) -> Result<()> {
        validate_folder_name(new_name).map_err(Error::Validation)?;
        self.send_json_unit(
            Method::PUT,
            &["api", "folders", old_name],
            &[],
            &json!({ "newName": new_name.trim() }),
        )
        .await
    }

    /// Deletes a custom folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_folder(&self, name: &str) -> Result<()> {
        self.call(Method::DELETE, &["api", "folders", name], &[])
            .await
    }
}
