use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Report PDFs and checklist photos, addressed by relative key under the storage root.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates or overwrites the file stored under `key`.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| AppError::storage(key, error))?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|error| AppError::storage(key, error))
    }

    pub async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path).await.map_err(|error| match error.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!("file '{key}' is missing from disk")),
            _ => AppError::storage(key, error),
        })
    }

    /// Removes the file under `key`; a file that is already gone is not an error.
    pub async fn remove(&self, key: &str) {
        let path = match self.resolve(key) {
            Ok(path) => path,
            Err(_) => return,
        };

        if let Err(error) = tokio::fs::remove_file(&path).await {
            if error.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    error = ?error,
                    path = %path.display(),
                    "failed to remove file from storage"
                );
            }
        }
    }

    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        if relative.as_os_str().is_empty() {
            return Err(AppError::Internal);
        }

        if relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::RootDir | Component::Prefix(_)
                )
            })
        {
            tracing::warn!(key, "rejected unsafe storage key");
            return Err(AppError::Internal);
        }

        Ok(self.root.join(relative))
    }
}

/// Every close writes a new revision; the previous one is dropped only after
/// the task row points at the new key.
pub fn report_key(task_id: &str, revision: &str) -> String {
    format!("reports/task-{task_id}-{revision}.pdf")
}

pub fn attachment_key(attachment_id: &str, filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|value| value.to_str())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|value| value.to_ascii_lowercase());

    match extension {
        Some(extension) => format!("attachments/{attachment_id}.{extension}"),
        None => format!("attachments/{attachment_id}.bin"),
    }
}
