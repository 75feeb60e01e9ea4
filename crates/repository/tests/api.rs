//! End-to-end tests of the repository API over the in-memory store.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`,
//! so extractors, session envelopes and status mapping are all exercised.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use serde_json::{json, Value};
use sio_core::crypto::{
    aead, derive_subject_key, file_handle, public_key_to_pem, EphemeralKeyPair, PublicKey,
    SessionKey,
};
use sio_core::protocol::{
    CreateOrganization, EnvelopeHeader, FileContent, SessionEnvelope, SessionGrant,
    SessionHandshake, SignedMessage,
};
use sio_repository::{
    config::{AppConfig, DEFAULT_ENCRYPTION_KEY},
    crypto::Encryptor,
    files::FileStore,
    identity::ServerIdentity,
    router::build_router,
    state::AppState,
    store::MemoryOrganizationStore,
};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    app: Router,
    repository_key: PublicKey,
    _files: TempDir,
}

fn harness() -> Harness {
    let files = tempfile::tempdir().unwrap();
    let identity = ServerIdentity::generate().unwrap();
    let repository_key = identity.public_key();
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(MemoryOrganizationStore::new()),
        FileStore::new(files.path()),
        identity,
        Encryptor::from_base64(DEFAULT_ENCRYPTION_KEY).unwrap(),
    );
    Harness {
        app: build_router(state),
        repository_key,
        _files: files,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: &impl Serialize) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_org(h: &Harness, org: &str, username: &str, password: &str) -> StatusCode {
    let key = derive_subject_key(password).unwrap();
    let request = CreateOrganization {
        organization: org.to_string(),
        username: username.to_string(),
        name: format!("{} Founder", username),
        email: format!("{}@{}.org", username, org),
        public_key: public_key_to_pem(&key.public_key()).unwrap(),
    };
    let (status, body) = send(&h.app, Method::POST, "/api/v1/auth/organization", &request).await;
    if status == StatusCode::OK {
        let signed: SignedMessage = serde_json::from_value(body).unwrap();
        let echoed: CreateOrganization = signed.open(&h.repository_key).unwrap();
        assert_eq!(echoed, request);
    }
    status
}

/// Client side of an open session.
struct ClientSession {
    id: String,
    key: SessionKey,
    msg_id: u64,
}

impl ClientSession {
    async fn call(
        &mut self,
        app: &Router,
        method: Method,
        path: &str,
        payload: Value,
    ) -> (StatusCode, Value) {
        self.msg_id += 1;
        let envelope = SessionEnvelope::seal(
            &self.key,
            EnvelopeHeader::new(self.id.clone(), self.msg_id),
            &payload,
        )
        .unwrap();
        let (status, body) = send(app, method, &format!("/api/v1{}", path), &envelope).await;
        if status.as_u16() == 499 {
            return (status, body);
        }

        let reply: SessionEnvelope = serde_json::from_value(body).unwrap();
        assert!(reply.msg_id() > self.msg_id);
        self.msg_id = reply.msg_id();
        (status, reply.open(&self.key).unwrap())
    }
}

async fn open_session(
    h: &Harness,
    org: &str,
    username: &str,
    password: &str,
) -> Result<ClientSession, (StatusCode, Value)> {
    let key = derive_subject_key(password).unwrap();
    let client = EphemeralKeyPair::generate().unwrap();
    let handshake = SignedMessage::sign(
        &key,
        &SessionHandshake {
            organization: org.to_string(),
            username: username.to_string(),
            client_ephemeral_public_key: client.public_pem().to_string(),
        },
    )
    .unwrap();

    let (status, body) = send(&h.app, Method::POST, "/api/v1/auth/session", &handshake).await;
    if status != StatusCode::OK {
        return Err((status, body));
    }
    let signed: SignedMessage = serde_json::from_value(body).unwrap();
    let grant: SessionGrant = signed.open(&h.repository_key).unwrap();
    assert_eq!(grant.organization, org);
    assert_eq!(grant.username, username);

    Ok(ClientSession {
        id: grant.session_id,
        key: client
            .derive_session_key(&grant.server_ephemeral_public_key)
            .unwrap(),
        msg_id: 0,
    })
}

async fn add_subject(h: &Harness, session: &mut ClientSession, username: &str, password: &str) {
    let key = derive_subject_key(password).unwrap();
    let (status, _) = session
        .call(
            &h.app,
            Method::POST,
            "/organizations/subjects",
            json!({
                "username": username,
                "name": username,
                "email": format!("{}@acme.org", username),
                "public_key": public_key_to_pem(&key.public_key()).unwrap(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_organizations_are_listed_and_unique() {
    let h = harness();
    assert_eq!(create_org(&h, "acme", "alice", "pw-alice").await, StatusCode::OK);
    assert_eq!(create_org(&h, "globex", "hank", "pw-hank").await, StatusCode::OK);
    assert_eq!(create_org(&h, "acme", "mallory", "pw").await, StatusCode::CONFLICT);

    let (status, body) = send(&h.app, Method::GET, "/api/v1/organizations/", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"name": "acme"}, {"name": "globex"}]));
}

#[tokio::test]
async fn test_handshake_failures() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;

    let (status, _) = open_session(&h, "acme", "alice", "wrong").await.err().unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = open_session(&h, "acme", "nobody", "pw").await.err().unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = open_session(&h, "initech", "alice", "pw-alice").await.err().unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_roles_gate_subject_management() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;
    let mut alice = open_session(&h, "acme", "alice", "pw-alice").await.unwrap();

    let (status, body) = alice.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"roles": []}));

    // Holding Managers is not enough; it must be assumed.
    let (status, body) = alice
        .call(
            &h.app,
            Method::POST,
            "/organizations/subjects",
            json!({"username": "bob", "name": "Bob", "email": "bob@acme.org",
                   "public_key": public_key_to_pem(&derive_subject_key("pw-bob").unwrap().public_key()).unwrap()}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Permission SUBJECT_NEW is required"}));

    let (status, _) = alice
        .call(&h.app, Method::POST, "/sessions/roles", json!({"role": "Managers"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    add_subject(&h, &mut alice, "bob", "pw-bob").await;

    let (status, body) = alice
        .call(&h.app, Method::GET, "/organizations/subjects/state", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"alice": "active", "bob": "active"}));

    let (status, _) = alice
        .call(&h.app, Method::POST, "/organizations/roles", json!({"role": "Auditors"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = alice
        .call(
            &h.app,
            Method::POST,
            "/organizations/roles/subjects",
            json!({"role": "Auditors", "username": "bob"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = alice
        .call(&h.app, Method::GET, "/organizations/subjects/roles", json!({"username": "bob"}))
        .await;
    assert_eq!(body, json!({"Auditors": "active"}));

    // The last manager cannot be taken out of Managers.
    let (status, _) = alice
        .call(
            &h.app,
            Method::DELETE,
            "/organizations/roles/subjects",
            json!({"role": "Managers", "username": "alice"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_replayed_message_is_rejected() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;
    let mut alice = open_session(&h, "acme", "alice", "pw-alice").await.unwrap();

    let (status, _) = alice.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // Resend with a msg_id the server has already seen.
    alice.msg_id -= 2;
    let (status, body) = alice.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status.as_u16(), 499);
    assert_eq!(body["error"], "Replayed message");

    alice.id = "no-such-session".to_string();
    let (status, _) = alice.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status.as_u16(), 499);
}

#[tokio::test]
async fn test_suspended_subject_is_locked_out() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;
    let mut alice = open_session(&h, "acme", "alice", "pw-alice").await.unwrap();
    alice
        .call(&h.app, Method::POST, "/sessions/roles", json!({"role": "Managers"}))
        .await;
    add_subject(&h, &mut alice, "bob", "pw-bob").await;

    let mut bob = open_session(&h, "acme", "bob", "pw-bob").await.unwrap();
    let (status, _) = bob.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = alice
        .call(
            &h.app,
            Method::PUT,
            "/organizations/subjects/state",
            json!({"username": "bob", "state": "suspended"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = bob.call(&h.app, Method::GET, "/sessions/roles", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "User is not active"}));

    let (status, _) = open_session(&h, "acme", "bob", "pw-bob").await.err().unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_document_lifecycle() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;
    let mut alice = open_session(&h, "acme", "alice", "pw-alice").await.unwrap();
    alice
        .call(&h.app, Method::POST, "/sessions/roles", json!({"role": "Managers"}))
        .await;

    let plaintext = b"quarterly numbers";
    let key = aead::generate_key();
    let blob = aead::seal_blob(&key, plaintext).unwrap();
    let handle = file_handle(plaintext);

    let (status, _) = alice
        .call(
            &h.app,
            Method::POST,
            "/organizations/documents",
            json!({
                "encryption_file": BASE64.encode(&blob),
                "file_handle": handle,
                "name": "report",
                "key": hex::encode(key),
                "alg": "AES-GCM",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, docs) = alice
        .call(&h.app, Method::GET, "/organizations/documents", json!({"creator": "alice"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs.as_array().unwrap().len(), 1);
    assert_eq!(docs[0]["document_name"], "report");

    let (status, metadata) = alice
        .call(
            &h.app,
            Method::GET,
            "/organizations/documents/metadata",
            json!({"document_name": "report"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["key"], hex::encode(key));
    assert_eq!(metadata["file_handle"], handle.as_str());

    let (status, body) = send(&h.app, Method::GET, "/api/v1/files/", &json!({"file_handle": handle})).await;
    assert_eq!(status, StatusCode::OK);
    let signed: SignedMessage = serde_json::from_value(body).unwrap();
    let content: FileContent = signed.open(&h.repository_key).unwrap();
    let downloaded = BASE64.decode(content.file_content).unwrap();
    assert_eq!(aead::open_blob(&key, &downloaded).unwrap(), plaintext);

    let (status, body) = alice
        .call(
            &h.app,
            Method::DELETE,
            "/organizations/documents/",
            json!({"document_name": "report"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"file_handle": handle}));

    let (_, metadata) = alice
        .call(
            &h.app,
            Method::GET,
            "/organizations/documents/metadata",
            json!({"document_name": "report"}),
        )
        .await;
    assert_eq!(metadata["file_handle"], Value::Null);
    assert_eq!(metadata["deleter"], "alice");
}

#[tokio::test]
async fn test_health_reports_sessions() {
    let h = harness();
    create_org(&h, "acme", "alice", "pw-alice").await;
    open_session(&h, "acme", "alice", "pw-alice").await.unwrap();

    let (status, body) = send(&h.app, Method::GET, "/api/health", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
    assert_eq!(body["sessions"], 1);

    let (status, body) = send(&h.app, Method::GET, "/health", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

async fn manager_session(h: &Harness, org: &str, username: &str, password: &str) -> ClientSession {
    assert_eq!(create_org(h, org, username, password).await, StatusCode::OK);
    let mut session = open_session(h, org, username, password).await.unwrap();
    let (status, _) = session
        .call(&h.app, Method::POST, "/sessions/roles", json!({"role": "Managers"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    session
}

/// Upload `plaintext` under a fresh key; returns the status and the key used.
async fn upload(
    h: &Harness,
    session: &mut ClientSession,
    name: &str,
    plaintext: &[u8],
) -> (StatusCode, [u8; aead::KEY_SIZE]) {
    let key = aead::generate_key();
    let blob = aead::seal_blob(&key, plaintext).unwrap();
    let (status, _) = session
        .call(
            &h.app,
            Method::POST,
            "/organizations/documents",
            json!({
                "encryption_file": BASE64.encode(&blob),
                "file_handle": file_handle(plaintext),
                "name": name,
                "key": hex::encode(key),
                "alg": "AES-GCM",
            }),
        )
        .await;
    (status, key)
}

async fn download(h: &Harness, handle: &str) -> Vec<u8> {
    let (status, body) = send(&h.app, Method::GET, "/api/v1/files/", &json!({"file_handle": handle})).await;
    assert_eq!(status, StatusCode::OK);
    let signed: SignedMessage = serde_json::from_value(body).unwrap();
    let content: FileContent = signed.open(&h.repository_key).unwrap();
    BASE64.decode(content.file_content).unwrap()
}

#[tokio::test]
async fn test_identical_content_in_one_organization() {
    let h = harness();
    let mut alice = manager_session(&h, "acme", "alice", "pw-alice").await;
    let plaintext = b"same bytes twice";

    let (status, first_key) = upload(&h, &mut alice, "original", plaintext).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = upload(&h, &mut alice, "duplicate", plaintext).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, docs) = alice
        .call(&h.app, Method::GET, "/organizations/documents", json!({}))
        .await;
    assert_eq!(docs.as_array().unwrap().len(), 1);

    let downloaded = download(&h, &file_handle(plaintext)).await;
    assert_eq!(aead::open_blob(&first_key, &downloaded).unwrap(), plaintext);
}

#[tokio::test]
async fn test_identical_content_across_organizations() {
    let h = harness();
    let mut alice = manager_session(&h, "acme", "alice", "pw-alice").await;
    let mut hank = manager_session(&h, "globex", "hank", "pw-hank").await;
    let plaintext = b"press release";

    let (status, acme_key) = upload(&h, &mut alice, "release", plaintext).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = upload(&h, &mut hank, "release", plaintext).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, metadata) = alice
        .call(
            &h.app,
            Method::GET,
            "/organizations/documents/metadata",
            json!({"document_name": "release"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metadata["key"], hex::encode(acme_key));

    let downloaded = download(&h, &file_handle(plaintext)).await;
    assert_eq!(aead::open_blob(&acme_key, &downloaded).unwrap(), plaintext);
}

#[tokio::test]
async fn test_delete_then_readd_same_content() {
    let h = harness();
    let mut alice = manager_session(&h, "acme", "alice", "pw-alice").await;
    let plaintext = b"contract draft";

    let (status, first_key) = upload(&h, &mut alice, "contract", plaintext).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = alice
        .call(
            &h.app,
            Method::DELETE,
            "/organizations/documents/",
            json!({"document_name": "contract"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = upload(&h, &mut alice, "contract-v2", plaintext).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let downloaded = download(&h, &file_handle(plaintext)).await;
    assert_eq!(aead::open_blob(&first_key, &downloaded).unwrap(), plaintext);

    let (status, _) = upload(&h, &mut alice, "contract-v2", b"contract final").await;
    assert_eq!(status, StatusCode::OK);
}
