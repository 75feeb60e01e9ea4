//! Local store for encrypted document files.
//!
//! Blobs are named by their file handle. Handles are checked before any
//! path is built, so a request can never name a file outside the root.
//!
//! A stored blob is never replaced. Two uploads of the same plaintext share a
//! handle but not a key, so overwriting would leave the first document's
//! ciphertext unreadable.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sio_core::crypto::is_valid_handle;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root directory if needed.
    pub async fn init(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!(root = %self.root.display(), "File store ready");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, handle: &str) -> AppResult<PathBuf> {
        if !is_valid_handle(handle) {
            return Err(AppError::BadRequest(format!(
                "Invalid file handle '{}'",
                handle
            )));
        }
        Ok(self.root.join(handle))
    }

    /// Write a new blob. Fails with `Conflict` if the handle is already stored.
    pub async fn put(&self, handle: &str, contents: &[u8]) -> AppResult<()> {
        let path = self.path_for(handle)?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Conflict(format!(
                    "File '{}' is already stored",
                    handle
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = write_all(&mut file, contents).await {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e.into());
        }
        tracing::debug!(file_handle = %handle, bytes = contents.len(), "File stored");
        Ok(())
    }

    /// Remove a blob written by a registration that did not complete.
    pub async fn discard(&self, handle: &str) -> AppResult<()> {
        let path = self.path_for(handle)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(file_handle = %handle, "Unregistered file discarded");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, handle: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(handle)?;
        match fs::read(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(
                format!("File '{}' not found", handle),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, handle: &str) -> AppResult<bool> {
        let path = self.path_for(handle)?;
        Ok(fs::try_exists(&path).await?)
    }
}

async fn write_all(file: &mut fs::File, contents: &[u8]) -> std::io::Result<()> {
    file.write_all(contents).await?;
    file.sync_all().await
}
