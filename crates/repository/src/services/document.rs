//! Document metadata, ACLs and encrypted file uploads.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{NaiveDate, Utc};
use sio_core::crypto::{aead, document_handle};
use sio_core::protocol::{
    AclChange, DateFilter, DeletedFile, DocumentMetadata, DocumentQuery, DocumentSummary,
    NewDocument, Permission, StatusMessage, DATE_FORMAT,
};

use super::load_organization;
use crate::crypto::Encryptor;
use crate::domain::DocumentRecord;
use crate::error::{AppError, AppResult};
use crate::files::FileStore;
use crate::result_ext::ResultExt;
use crate::session::SessionContext;
use crate::store::OrganizationStore;

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn OrganizationStore>,
    files: FileStore,
    encryptor: Encryptor,
}

impl DocumentService {
    pub fn new(store: Arc<dyn OrganizationStore>, files: FileStore, encryptor: Encryptor) -> Self {
        Self {
            store,
            files,
            encryptor,
        }
    }

    pub async fn list(
        &self,
        ctx: &SessionContext,
        query: DocumentQuery,
    ) -> AppResult<Vec<DocumentSummary>> {
        let date = parse_date_filter(query.date_filter, query.date_str.as_deref())?;
        let organization = load_organization(self.store.as_ref(), &ctx.organization).await?;
        Ok(organization.list_documents(query.creator.as_deref(), date))
    }

    /// Store an encrypted file and register its document.
    ///
    /// The file lands on disk before the metadata is committed. A stored file
    /// handle is never reused: uploading content whose handle is already held,
    /// by this or any organization, fails with `Conflict`. When the metadata
    /// commit fails the freshly written file is discarded again.
    pub async fn add(&self, ctx: &SessionContext, request: NewDocument) -> AppResult<StatusMessage> {
        if request.alg != aead::ALGORITHM {
            return Err(AppError::BadRequest(format!(
                "Unsupported algorithm '{}', expected {}",
                request.alg,
                aead::ALGORITHM
            )));
        }
        let contents = BASE64
            .decode(&request.encryption_file)
            .map_err(|e| AppError::BadRequest(format!("File is not base64: {}", e)))?;
        let handle = document_handle(&ctx.organization, &request.name);
        let sealed_key = self.encryptor.seal_key(&request.key, &handle)?;

        // Fail fast before touching disk; the update below re-checks.
        let snapshot = load_organization(self.store.as_ref(), &ctx.organization).await?;
        snapshot.ensure_permission(&ctx.roles, Permission::DocNew)?;
        if snapshot.documents.contains_key(&request.name) {
            return Err(AppError::Conflict(format!(
                "Document '{}' already exists",
                request.name
            )));
        }

        self.files
            .put(&request.file_handle, &contents)
            .await
            .log("storing document file")?;

        let record = DocumentRecord {
            name: request.name.clone(),
            document_handle: handle,
            creator: ctx.username.clone(),
            create_date: Utc::now(),
            file_handle: Some(request.file_handle.clone()),
            deleter: None,
            alg: request.alg.clone(),
            sealed_key,
            acl: Default::default(),
        };

        let committed = self
            .store
            .update(&ctx.organization, &mut |org| {
                org.ensure_permission(&ctx.roles, Permission::DocNew)?;
                org.add_document(record.clone())?;
                Ok(())
            })
            .await;
        if let Err(e) = committed {
            self.files
                .discard(&request.file_handle)
                .await
                .log_warn("discarding unregistered file")
                .ok();
            return Err(e);
        }

        tracing::info!(
            organization = %ctx.organization,
            document = %request.name,
            file_handle = %request.file_handle,
            creator = %ctx.username,
            "Document added"
        );
        Ok(StatusMessage::new(format!("Document '{}' added", request.name)))
    }

    pub async fn metadata(
        &self,
        ctx: &SessionContext,
        document_name: &str,
    ) -> AppResult<DocumentMetadata> {
        let organization = load_organization(self.store.as_ref(), &ctx.organization).await?;
        let record =
            organization.ensure_document_permission(&ctx.roles, document_name, Permission::DocRead)?;
        let key = self
            .encryptor
            .open_key(&record.sealed_key, &record.document_handle)?;

        Ok(DocumentMetadata {
            document_name: record.name.clone(),
            document_handle: record.document_handle.clone(),
            creator: record.creator.clone(),
            create_date: record.create_date,
            file_handle: record.file_handle.clone(),
            deleter: record.deleter.clone(),
            alg: record.alg.clone(),
            key,
            acl: record.acl.clone(),
        })
    }

    /// Detach a document's file; returns the handle that ceased to exist.
    pub async fn delete(&self, ctx: &SessionContext, document_name: &str) -> AppResult<DeletedFile> {
        let mut removed = None;
        self.store
            .update(&ctx.organization, &mut |org| {
                org.ensure_document_permission(&ctx.roles, document_name, Permission::DocDelete)?;
                removed = Some(org.delete_document(document_name, &ctx.username)?);
                Ok(())
            })
            .await?;

        let file_handle = removed
            .ok_or_else(|| AppError::Internal("Deletion produced no file handle".to_string()))?;
        tracing::info!(
            organization = %ctx.organization,
            document = %document_name,
            deleter = %ctx.username,
            "Document file deleted"
        );
        Ok(DeletedFile { file_handle })
    }

    pub async fn change_acl(&self, ctx: &SessionContext, change: AclChange) -> AppResult<StatusMessage> {
        self.store
            .update(&ctx.organization, &mut |org| {
                org.ensure_document_permission(
                    &ctx.roles,
                    &change.document_name,
                    Permission::DocAcl,
                )?;
                org.change_acl(
                    &change.document_name,
                    change.operation,
                    &change.role,
                    change.permission,
                )?;
                Ok(())
            })
            .await?;

        tracing::info!(
            organization = %ctx.organization,
            document = %change.document_name,
            role = %change.role,
            permission = %change.permission,
            "Document ACL changed"
        );
        Ok(StatusMessage::new(format!(
            "ACL of '{}' updated",
            change.document_name
        )))
    }
}

/// A date filter needs both its kind and a `DD-MM-YYYY` date.
fn parse_date_filter(
    filter: Option<DateFilter>,
    date: Option<&str>,
) -> AppResult<Option<(DateFilter, NaiveDate)>> {
    match (filter, date) {
        (None, None) => Ok(None),
        (Some(filter), Some(date)) => NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map(|day| Some((filter, day)))
            .map_err(|e| AppError::BadRequest(format!("Invalid date '{}': {}", date, e))),
        _ => Err(AppError::BadRequest(
            "Date filter and date must be given together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Organization, Subject, MANAGERS_ROLE};
    use crate::store::MemoryOrganizationStore;
    use sio_core::crypto::file_handle;
    use sio_core::protocol::AclOperation;

    struct Fixture {
        service: DocumentService,
        ctx: SessionContext,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryOrganizationStore::new());
        let mut org = Organization::new(
            "acme",
            Subject::new("alice", "Alice", "alice@acme.org", "pem"),
            Utc::now(),
        );
        org.add_role("Readers").unwrap();
        store.insert(org).await.unwrap();

        let encryptor = Encryptor::from_base64(&Encryptor::generate_key_base64()).unwrap();
        let service = DocumentService::new(store, FileStore::new(dir.path()), encryptor);
        let ctx = SessionContext {
            session_id: "s".to_string(),
            organization: "acme".to_string(),
            username: "alice".to_string(),
            roles: vec![MANAGERS_ROLE.to_string()],
            reply_msg_id: 2,
            key: [0u8; 32],
        };
        Fixture {
            service,
            ctx,
            _dir: dir,
        }
    }

    fn new_document(name: &str, plaintext: &[u8]) -> NewDocument {
        let key = aead::generate_key();
        let blob = aead::seal_blob(&key, plaintext).unwrap();
        NewDocument {
            encryption_file: BASE64.encode(blob),
            file_handle: file_handle(plaintext),
            name: name.to_string(),
            key: hex::encode(key),
            alg: aead::ALGORITHM.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_then_read_metadata() {
        let f = fixture().await;
        let request = new_document("report", b"quarterly numbers");
        f.service.add(&f.ctx, request.clone()).await.unwrap();

        let metadata = f.service.metadata(&f.ctx, "report").await.unwrap();
        assert_eq!(metadata.key, request.key);
        assert_eq!(metadata.file_handle.as_deref(), Some(request.file_handle.as_str()));
        assert_eq!(metadata.document_handle, document_handle("acme", "report"));
        assert_eq!(metadata.acl[MANAGERS_ROLE].len(), 3);

        assert!(matches!(
            f.service.add(&f.ctx, request).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_read_requires_acl() {
        let mut f = fixture().await;
        f.service
            .add(&f.ctx, new_document("report", b"data"))
            .await
            .unwrap();

        f.ctx.roles = vec!["Readers".to_string()];
        let err = f.service.metadata(&f.ctx, "report").await.unwrap_err();
        assert_eq!(err.status_and_message().1, "Permission DOC_READ is required");

        f.ctx.roles = vec![MANAGERS_ROLE.to_string()];
        f.service
            .change_acl(
                &f.ctx,
                AclChange {
                    document_name: "report".to_string(),
                    operation: AclOperation::Add,
                    role: "Readers".to_string(),
                    permission: Permission::DocRead,
                },
            )
            .await
            .unwrap();

        f.ctx.roles = vec!["Readers".to_string()];
        assert!(f.service.metadata(&f.ctx, "report").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let f = fixture().await;
        let request = new_document("report", b"data");
        f.service.add(&f.ctx, request.clone()).await.unwrap();

        let deleted = f.service.delete(&f.ctx, "report").await.unwrap();
        assert_eq!(deleted.file_handle, request.file_handle);
        assert!(matches!(
            f.service.delete(&f.ctx, "report").await,
            Err(AppError::NotFound(_))
        ));

        let listed = f.service.list(&f.ctx, DocumentQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].deleter.as_deref(), Some("alice"));
        assert!(listed[0].file_handle.is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let f = fixture().await;

        let mut request = new_document("report", b"data");
        request.alg = "ChaCha20".to_string();
        assert!(matches!(
            f.service.add(&f.ctx, request).await,
            Err(AppError::BadRequest(_))
        ));

        let mut request = new_document("report", b"data");
        request.file_handle = "../escape".to_string();
        assert!(matches!(
            f.service.add(&f.ctx, request).await,
            Err(AppError::BadRequest(_))
        ));
    }

    async fn decrypt_stored(f: &Fixture, name: &str) -> Vec<u8> {
        let metadata = f.service.metadata(&f.ctx, name).await.unwrap();
        let handle = metadata.file_handle.unwrap();
        let blob = f.service.files.get(&handle).await.unwrap();
        aead::open_blob(&hex::decode(metadata.key).unwrap(), &blob).unwrap()
    }

    #[tokio::test]
    async fn test_identical_content_keeps_first_document_readable() {
        let f = fixture().await;
        let first = new_document("report", b"shared plaintext");
        f.service.add(&f.ctx, first).await.unwrap();

        let second = new_document("copy", b"shared plaintext");
        assert!(matches!(
            f.service.add(&f.ctx, second).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            f.service.metadata(&f.ctx, "copy").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(decrypt_stored(&f, "report").await, b"shared plaintext");
    }

    #[tokio::test]
    async fn test_readding_deleted_content_keeps_old_file() {
        let f = fixture().await;
        let original = new_document("report", b"draft");
        f.service.add(&f.ctx, original.clone()).await.unwrap();
        f.service.delete(&f.ctx, "report").await.unwrap();

        assert!(matches!(
            f.service.add(&f.ctx, new_document("report-v2", b"draft")).await,
            Err(AppError::Conflict(_))
        ));
        let blob = f.service.files.get(&original.file_handle).await.unwrap();
        let key = hex::decode(&original.key).unwrap();
        assert_eq!(aead::open_blob(&key, &blob).unwrap(), b"draft");
    }

    /// Lets reads through and refuses every write.
    struct ReadOnlyStore(MemoryOrganizationStore);

    #[async_trait::async_trait]
    impl OrganizationStore for ReadOnlyStore {
        fn backend(&self) -> &'static str {
            "read-only"
        }

        async fn insert(&self, organization: Organization) -> AppResult<()> {
            self.0.insert(organization).await
        }

        async fn get(&self, name: &str) -> AppResult<Option<Organization>> {
            self.0.get(name).await
        }

        async fn list(&self) -> AppResult<Vec<String>> {
            self.0.list().await
        }

        async fn update(&self, _name: &str, _mutation: crate::store::Mutation<'_>) -> AppResult<()> {
            Err(AppError::Internal("store is read-only".to_string()))
        }

        async fn health(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_failed_registration_discards_file() {
        let dir = tempfile::tempdir().unwrap();
        let inner = MemoryOrganizationStore::new();
        inner
            .insert(Organization::new(
                "acme",
                Subject::new("alice", "Alice", "alice@acme.org", "pem"),
                Utc::now(),
            ))
            .await
            .unwrap();
        let files = FileStore::new(dir.path());
        let service = DocumentService::new(
            Arc::new(ReadOnlyStore(inner)),
            files.clone(),
            Encryptor::from_base64(&Encryptor::generate_key_base64()).unwrap(),
        );
        let f = fixture().await;

        let request = new_document("report", b"never registered");
        assert!(service.add(&f.ctx, request.clone()).await.is_err());
        assert!(!files.exists(&request.file_handle).await.unwrap());
    }

    #[test]
    fn test_parse_date_filter() {
        assert_eq!(parse_date_filter(None, None).unwrap(), None);
        assert_eq!(
            parse_date_filter(Some(DateFilter::EqualTo), Some("05-03-2025")).unwrap(),
            Some((DateFilter::EqualTo, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()))
        );
        assert!(parse_date_filter(Some(DateFilter::NewerThan), None).is_err());
        assert!(parse_date_filter(Some(DateFilter::NewerThan), Some("2025-03-05")).is_err());
    }
}
