//! Attachment models.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Attachment metadata as referenced by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    /// Server-issued attachment id.
    pub id: String,
    /// Original file name.
    #[serde(default)]
    pub file_name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: String,
    /// Addresses allowed to download the attachment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<String>,
}

impl AttachmentDescriptor {
    /// Describes `file` under a reserved id.
    #[must_use]
    pub fn reserved(id: impl Into<String>, file: &OutgoingFile, accessors: &[String]) -> Self {
        Self {
            id: id.into(),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            accessors: accessors.to_vec(),
        }
    }
}

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    /// File name sent to the server.
    pub file_name: String,
    /// MIME type sent as the upload's content type.
    pub mime_type: String,
    /// Contents.
    pub bytes: Bytes,
}

impl OutgoingFile {
    /// Creates a file, inferring the MIME type from its extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_from_file_name(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// Overrides the inferred MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Reads a file from disk.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or has no file name.
    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Infers a MIME type from a file name's extension.
///
/// The extension is the segment after the *first* dot, which is what the
/// attachment endpoint checks the declared type against: `a.tar.gz` is a
/// `tar` file and `photo.final.jpeg` has no known type.
#[must_use]
pub fn mime_from_file_name(file_name: &str) -> &'static str {
    let Some(extension) = file_name.split('.').nth(1) else {
        return OCTET_STREAM;
    };
    match extension.to_ascii_lowercase().as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => OCTET_STREAM,
    }
}
