//! SHA-256 handles for documents and file contents.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const HANDLE_HEX_LEN: usize = 64;

/// Compute the SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Handle identifying a document inside an organization.
pub fn document_handle(organization: &str, document_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(organization.as_bytes());
    hasher.update(document_name.as_bytes());
    hex::encode(hasher.finalize())
}

/// Handle of a file: the digest of its plaintext content.
pub fn file_handle(content: &[u8]) -> String {
    sha256_hex(content)
}

/// Whether `handle` looks like a hex SHA-256 digest.
pub fn is_valid_handle(handle: &str) -> bool {
    handle.len() == HANDLE_HEX_LEN
        && handle
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
