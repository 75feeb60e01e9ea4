//! Anonymous file download.

use axum::{extract::State, Json};
use sio_core::protocol::{FileRequest, SignedMessage};

use crate::error::AppResult;
use crate::state::AppState;

/// Download an encrypted file.
///
/// `GET /api/v1/files/`
///
/// # Request Body
///
/// ```json
/// {"file_handle": "9f86d081884c7d65..."}
/// ```
///
/// # Response
///
/// Signed `{"file_handle": "...", "file_content": "<base64 nonce||ciphertext>"}`.
pub async fn get_file(
    State(state): State<AppState>,
    Json(request): Json<FileRequest>,
) -> AppResult<Json<SignedMessage>> {
    Ok(Json(state.files.get(&request.file_handle).await?))
}
