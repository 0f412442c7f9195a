use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use dgenerate_shared::types::MediaType;

use crate::error::ServerError;

/// A file written by [`MediaStore::store`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMedia {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub media_type: MediaType,
}

/// Flat directory of uploaded challenge media, served back by filename.
///
/// Files are never overwritten: a second upload under the same name is
/// rejected with [`ServerError::MediaExists`].
#[derive(Debug, Clone)]
pub struct MediaStore {
    base_path: PathBuf,
    public_base_url: String,
    max_size: usize,
}

impl MediaStore {
    pub async fn new(
        base_path: PathBuf,
        public_base_url: impl Into<String>,
        max_size: usize,
    ) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::MediaStorage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media store initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_size,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.public_base_url, filename)
    }

    pub async fn store(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredMedia, ServerError> {
        let media_type = MediaType::from_content_type(content_type)
            .ok_or_else(|| ServerError::UnsupportedMedia(content_type.to_string()))?;
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::MediaTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.safe_media_path(filename)?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ServerError::MediaExists(filename.to_string()));
            }
            Err(e) => {
                return Err(ServerError::MediaStorage(format!(
                    "Failed to create {}: {}",
                    filename, e
                )));
            }
        };

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            // Don't leave a truncated file claiming the name.
            let _ = fs::remove_file(&path).await;
            return Err(ServerError::MediaStorage(format!(
                "Failed to write {}: {}",
                filename, e
            )));
        }

        debug!(filename, size = data.len(), "Stored media");

        Ok(StoredMedia {
            url: self.public_url(filename),
            filename: filename.to_string(),
            size: data.len(),
            media_type,
        })
    }

    /// File bytes and the content type inferred from the extension.
    pub async fn get(&self, filename: &str) -> Result<(Vec<u8>, &'static str), ServerError> {
        let path = self.safe_media_path(filename)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ServerError::NotFound(format!("Media {filename}")));
            }
            Err(e) => {
                return Err(ServerError::MediaStorage(format!(
                    "Failed to read {}: {}",
                    filename, e
                )));
            }
        };

        debug!(filename, size = data.len(), "Retrieved media");
        Ok((data, content_type_for(filename)))
    }

    fn safe_media_path(&self, filename: &str) -> Result<PathBuf, ServerError> {
        validate_filename(filename)?;
        Ok(self.base_path.join(filename))
    }
}

/// Only plain names are accepted: `[A-Za-z0-9._-]`, no leading dot, no `..`.
fn validate_filename(filename: &str) -> Result<(), ServerError> {
    let valid = !filename.is_empty()
        && filename.len() <= 255
        && !filename.starts_with('.')
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ServerError::BadRequest(format!(
            "Invalid filename: {filename}"
        )))
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
