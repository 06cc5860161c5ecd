//! Attachment endpoints.

use std::path::{Path, PathBuf};

use reqwest::Method;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info};

use super::ApiClient;
use crate::Result;
use crate::model::{AttachmentDescriptor, OutgoingFile};

#[derive(Debug, Deserialize)]
struct ReservedId {
    id: String,
}

/// A downloaded attachment on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Where the file was written.
    pub path: PathBuf,
    /// Content type declared by the server.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub size: u64,
}

impl ApiClient {
    /// Reserves an attachment id ahead of upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn reserve_attachment_id(&self) -> Result<String> {
        let reserved: ReservedId = self.get_json(&["api", "attachments", "ids"], &[]).await?;
        debug!("Reserved attachment id {}", reserved.id);
        Ok(reserved.id)
    }

    /// Uploads one file.
    ///
    /// With `id` the bytes are stored under a reserved id; without it the
    /// server issues one. Returns the server's descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails. A 409 means the MIME type does
    /// not match the file extension.
    pub async fn upload_attachment(
        &self,
        id: Option<&str>,
        file: &OutgoingFile,
        accessors: &[String],
    ) -> Result<AttachmentDescriptor> {
        let url = self.config.endpoint(&["api", "attachments"])?;
        let mut query = vec![
            ("fileName", file.file_name.clone()),
            ("accessors", accessors.join(",")),
        ];
        if let Some(id) = id {
            query.push(("id", id.to_string()));
        }

        let request = self
            .request(Method::PUT, url)?
            .query(&query)
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .body(file.bytes.clone());
        let mut descriptor: AttachmentDescriptor = self.execute_json(request).await?;

        // Older servers answer without these fields.
        if descriptor.file_name.is_empty() {
            descriptor.file_name.clone_from(&file.file_name);
        }
        if descriptor.mime_type.is_empty() {
            descriptor.mime_type.clone_from(&file.mime_type);
        }
        info!(
            "Uploaded {} ({} bytes) as {}",
            file.file_name,
            file.len(),
            descriptor.id
        );
        Ok(descriptor)
    }

    /// Downloads an attachment into `dir`.
    ///
    /// The file is named from the server's `Content-Disposition`, falling back
    /// to the descriptor's name. Bytes are written to a temporary file that is
    /// renamed into place, so a failed download leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the write fails.
    pub async fn download_attachment(
        &self,
        attachment: &AttachmentDescriptor,
        dir: &Path,
    ) -> Result<DownloadedFile> {
        let url = self
            .config
            .endpoint(&["api", "attachments", attachment.id.as_str()])?;
        let response = self.execute(self.request(Method::GET, url)?).await?;

        let headers = response.headers();
        let mime_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let declared = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);
        let file_name = declared
            .as_deref()
            .and_then(sanitize_file_name)
            .or_else(|| sanitize_file_name(&attachment.file_name))
            .unwrap_or_else(|| attachment.id.clone());

        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&file_name);
        let partial = dir.join(format!(".{file_name}.part"));
        if let Err(e) = tokio::fs::write(&partial, &bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &path).await?;

        info!("Downloaded attachment {} to {:?}", attachment.id, path);
        Ok(DownloadedFile {
            path,
            mime_type,
            size: bytes.len() as u64,
        })
    }
}

/// Extracts `filename` from a `Content-Disposition` header value.
fn disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let (key, name) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = name.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Reduces a server-supplied name to a bare file name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.chars().filter(|c| !c.is_control()).collect())
}
