//! Local disk storage for invoice attachments.
//!
//! Files are stored flat under the uploads directory with a random name that
//! keeps only a sanitized extension of the original file name.

use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::config::UploadSettings;
use crate::shared::error::AppError;

const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct AttachmentStorage {
    dir: PathBuf,
    public_path: String,
}

impl AttachmentStorage {
    pub fn new(settings: &UploadSettings) -> Self {
        Self {
            dir: PathBuf::from(&settings.dir),
            public_path: settings.public_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the uploads directory if missing.
    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create uploads directory: {}", e)))
    }

    /// Write the bytes under a fresh name and return that name.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<String, AppError> {
        self.ensure_dir().await?;

        let stored_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };

        fs::write(self.dir.join(&stored_name), data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store attachment: {}", e)))?;

        tracing::debug!(stored_name = %stored_name, size = data.len(), "Attachment stored");
        Ok(stored_name)
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub async fn delete(&self, stored_name: &str) -> Result<(), AppError> {
        let Some(path) = self.path_of(stored_name) else {
            return Ok(());
        };
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to delete attachment: {}", e))),
        }
    }

    /// Public URL path under which the static file service exposes the file.
    pub fn url_for(&self, stored_name: &str) -> String {
        format!("{}/{}", self.public_path, stored_name)
    }

    fn path_of(&self, stored_name: &str) -> Option<PathBuf> {
        let valid = !stored_name.is_empty()
            && stored_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
            && !stored_name.starts_with('.');
        valid.then(|| self.dir.join(stored_name))
    }
}

/// Lowercased ASCII alphanumeric extension of a file name, if any.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > MAX_EXTENSION_LEN || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
