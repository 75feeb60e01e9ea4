//! Drives the client library against a real repository server on an
//! ephemeral port.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use sio_cli::local::{self, EncryptionMetadata};
use sio_cli::{RepositoryClient, SessionFile};
use sio_core::crypto::{aead, file_handle};
use sio_core::protocol::{CreateOrganization, DocumentMetadata, RoleListing, StatusMessage};
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
use tokio::net::TcpListener;

async fn start_server(files: &TempDir) -> RepositoryClient {
    let identity = ServerIdentity::generate().unwrap();
    let repository_key = identity.public_key();
    let state = AppState::new(
        AppConfig::default(),
        Arc::new(MemoryOrganizationStore::new()),
        FileStore::new(files.path()),
        identity,
        Encryptor::from_base64(DEFAULT_ENCRYPTION_KEY).unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    RepositoryClient::new(&addr.to_string(), Some(repository_key))
}

#[tokio::test]
async fn test_document_roundtrip_through_client() {
    let dir = tempfile::tempdir().unwrap();
    let files = tempfile::tempdir().unwrap();
    let client = start_server(&files).await;

    let credentials = dir.path().join("alice.pub");
    let public_key = local::subject_credentials("pw-alice", &credentials).unwrap();
    client
        .create_organization(&CreateOrganization {
            organization: "acme".to_string(),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            email: "alice@acme.org".to_string(),
            public_key,
        })
        .await
        .unwrap();

    let orgs = client.list_organizations().await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].name, "acme");

    let (info, _grant) = client.create_session("acme", "alice", "pw-alice").await.unwrap();
    let session_path = dir.path().join("alice.session");
    let mut session = SessionFile::create(&session_path, info).unwrap();

    let _: StatusMessage = client
        .session_call(&mut session, Method::POST, "/sessions/roles", &json!({"role": "Managers"}))
        .await
        .unwrap();
    let roles: RoleListing = client
        .session_call(&mut session, Method::GET, "/sessions/roles", &json!({}))
        .await
        .unwrap();
    assert_eq!(roles.roles, ["Managers"]);

    // Counter persisted after every exchange: two requests, two replies.
    assert_eq!(SessionFile::open(&session_path).unwrap().info.msg_id, 4);

    let plaintext = b"minutes of the board meeting".to_vec();
    let key = aead::generate_key();
    let handle = file_handle(&plaintext);
    let _: StatusMessage = client
        .session_call(
            &mut session,
            Method::POST,
            "/organizations/documents",
            &json!({
                "encryption_file": base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    aead::seal_blob(&key, &plaintext).unwrap(),
                ),
                "file_handle": handle,
                "name": "minutes",
                "key": hex::encode(key),
                "alg": "AES-GCM",
            }),
        )
        .await
        .unwrap();

    let metadata: DocumentMetadata = client
        .session_call(
            &mut session,
            Method::GET,
            "/organizations/documents/metadata",
            &json!({"document_name": "minutes"}),
        )
        .await
        .unwrap();
    let blob = client.get_file(&handle).await.unwrap();
    let decrypted = local::decrypt_document(
        &EncryptionMetadata {
            key: metadata.key,
            alg: metadata.alg,
        },
        &blob,
        &handle,
    )
    .unwrap();
    assert_eq!(decrypted, plaintext);
}

#[tokio::test]
async fn test_errors_surface_with_status() {
    let dir = tempfile::tempdir().unwrap();
    let files = tempfile::tempdir().unwrap();
    let client = start_server(&files).await;

    let public_key = local::subject_credentials("pw-alice", &dir.path().join("a.pub")).unwrap();
    client
        .create_organization(&CreateOrganization {
            organization: "acme".to_string(),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            email: "alice@acme.org".to_string(),
            public_key,
        })
        .await
        .unwrap();

    let err = client
        .create_session("acme", "alice", "wrong password")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("[401]"), "{}", err);

    let (info, _) = client.create_session("acme", "alice", "pw-alice").await.unwrap();
    let mut session = SessionFile::create(dir.path().join("s.json"), info).unwrap();

    let err = client
        .session_call::<Value>(&mut session, Method::POST, "/organizations/roles", &json!({"role": "Auditors"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Permission ROLE_NEW is required"), "{}", err);

    // Rewinding the counter makes the next request a replay.
    session.info.msg_id = 0;
    let err = client
        .session_call::<Value>(&mut session, Method::GET, "/sessions/roles", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("[499]"), "{}", err);
}
