//! Anonymous download of encrypted files.
//!
//! Files are ciphertext; only subjects holding the document key (from its
//! metadata) can read them, so downloads need no session.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sio_core::protocol::{FileContent, SignedMessage};

use crate::error::AppResult;
use crate::files::FileStore;
use crate::identity::ServerIdentity;

#[derive(Clone)]
pub struct FileService {
    files: FileStore,
    identity: Arc<ServerIdentity>,
}

impl FileService {
    pub fn new(files: FileStore, identity: Arc<ServerIdentity>) -> Self {
        Self { files, identity }
    }

    pub async fn get(&self, file_handle: &str) -> AppResult<SignedMessage> {
        let contents = self.files.get(file_handle).await?;
        tracing::debug!(file_handle = %file_handle, bytes = contents.len(), "File served");

        self.identity.sign(&FileContent {
            file_handle: file_handle.to_string(),
            file_content: BASE64.encode(contents),
        })
    }
}
