use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::domain::FileHandle;

/// Binary payload handed over by the transport for a report image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// File storage collaborator. Handles are opaque to the workflows.
pub trait FileStore: Send + Sync {
    fn store(&self, upload: ImageUpload) -> Result<FileHandle, FileStoreError>;
    fn exists(&self, handle: &FileHandle) -> bool;
    fn remove(&self, handle: &FileHandle) -> Result<(), FileStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("file handle {0:?} is not a plain file name")]
    InvalidHandle(String),
    #[error("file {0:?} does not exist")]
    Missing(String),
    #[error("file storage io error: {0}")]
    Io(#[from] io::Error),
}

/// Stores uploads as `<millis>-<seq><ext>` inside a single directory.
#[derive(Debug)]
pub struct LocalFileStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, handle: &FileHandle) -> Result<PathBuf, FileStoreError> {
        let name = handle.0.as_str();
        let plain = !name.is_empty()
            && Path::new(name)
                .file_name()
                .map(|file_name| file_name == name)
                .unwrap_or(false);
        if !plain {
            return Err(FileStoreError::InvalidHandle(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

impl FileStore for LocalFileStore {
    fn store(&self, upload: ImageUpload) -> Result<FileHandle, FileStoreError> {
        fs::create_dir_all(&self.root)?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!(
            "{}-{seq}{}",
            Utc::now().timestamp_millis(),
            extension_of(&upload.file_name)
        );
        fs::write(self.root.join(&name), &upload.bytes)?;
        Ok(FileHandle(name))
    }

    fn exists(&self, handle: &FileHandle) -> bool {
        self.path_for(handle)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn remove(&self, handle: &FileHandle) -> Result<(), FileStoreError> {
        let path = self.path_for(handle)?;
        if !path.is_file() {
            return Err(FileStoreError::Missing(handle.0.clone()));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}
