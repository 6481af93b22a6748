//! Local-disk storage for uploaded files.
//!
//! Files land under the configured uploads directory keyed by a UUID that
//! keeps the original extension, and are served back at
//! `{base_url}/uploads/{key}`. Study deletion is soft, so nothing here ever
//! removes a file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("I/O error storing upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty upload")]
    Empty,
}

/// Result of storing one file.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Provider-assigned key, e.g. `3f2a….pdf`.
    pub storage_key: String,
    /// Original client file name.
    pub file_name: String,
    /// Public URL the file is served at.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    base_url: String,
}

impl UploadStore {
    /// Create the store, making sure the directory exists.
    pub fn new(dir: PathBuf, base_url: &str) -> Result<Self, UploadError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one uploaded file and return its public coordinates.
    pub fn store(&self, file_name: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }

        let key = match extension_of(file_name) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        std::fs::write(self.dir.join(&key), bytes)?;

        Ok(StoredUpload {
            url: format!("{}/uploads/{key}", self.base_url),
            storage_key: key,
            file_name: file_name.to_string(),
        })
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(char::is_alphanumeric))
}
