//! Document endpoints. Bodies travel inside a session envelope.

use axum::extract::State;
use sio_core::protocol::{AclChange, DocumentQuery, DocumentRef, NewDocument};

use crate::session::{SessionReply, SessionRequest};
use crate::state::AppState;

/// List documents.
///
/// `GET /api/v1/organizations/documents`
///
/// # Request Body
///
/// ```json
/// {"creator": "alice", "date_filter": "nt", "date_str": "01-03-2025"}
/// ```
///
/// All fields are optional; `date_filter` and `date_str` go together.
pub async fn list(
    State(state): State<AppState>,
    request: SessionRequest<DocumentQuery>,
) -> SessionReply {
    let SessionRequest { ctx, payload } = request;
    let result = state.documents.list(&ctx, payload).await;
    SessionReply::from_result(&ctx, result)
}

/// Upload an encrypted document.
///
/// `POST /api/v1/organizations/documents`
///
/// # Request Body
///
/// ```json
/// {
///   "encryption_file": "<base64 nonce||ciphertext>",
///   "file_handle": "<sha256 of plaintext>",
///   "name": "report",
///   "key": "<hex 32-byte key>",
///   "alg": "AES-GCM"
/// }
/// ```
///
/// Requires `DOC_NEW`.
pub async fn add(
    State(state): State<AppState>,
    request: SessionRequest<NewDocument>,
) -> SessionReply {
    let SessionRequest { ctx, payload } = request;
    let result = state.documents.add(&ctx, payload).await;
    SessionReply::from_result(&ctx, result)
}

/// Document metadata, including the file key.
///
/// `GET /api/v1/organizations/documents/metadata` with `{"document_name": "report"}`
///
/// Requires `DOC_READ` on the document.
pub async fn metadata(
    State(state): State<AppState>,
    request: SessionRequest<DocumentRef>,
) -> SessionReply {
    let result = state
        .documents
        .metadata(&request.ctx, &request.payload.document_name)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Detach the file from a document.
///
/// `DELETE /api/v1/organizations/documents/` with `{"document_name": "report"}`
///
/// Requires `DOC_DELETE` on the document. Replies `{"file_handle": "..."}`.
pub async fn delete(
    State(state): State<AppState>,
    request: SessionRequest<DocumentRef>,
) -> SessionReply {
    let result = state
        .documents
        .delete(&request.ctx, &request.payload.document_name)
        .await;
    SessionReply::from_result(&request.ctx, result)
}

/// Change a document ACL.
///
/// `POST /api/v1/organizations/documents/acl`
///
/// ```json
/// {"document_name": "report", "operation": "+", "role": "Readers", "permission": "DOC_READ"}
/// ```
///
/// Requires `DOC_ACL` on the document.
pub async fn change_acl(
    State(state): State<AppState>,
    request: SessionRequest<AclChange>,
) -> SessionReply {
    let SessionRequest { ctx, payload } = request;
    let result = state.documents.change_acl(&ctx, payload).await;
    SessionReply::from_result(&ctx, result)
}
