use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde_json::Value;

use crate::config::SigningConfig;
use crate::workflows::notifications::{Notification, NotificationDispatcher, NotificationError};
use crate::workflows::signing::domain::{
    Document, DocumentId, DocumentStatus, DocumentUpload, SignAction, SignatureSubmission,
    SignaturePlacement, SignerDraft, SignerId, SigningToken,
};
use crate::workflows::signing::lifecycle;
use crate::workflows::signing::repository::{
    DocumentRepository, DocumentStorage, RepositoryError, StorageError,
};
use crate::workflows::signing::{signing_router, DocumentSigningService};

pub(super) const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF\n";

pub(super) type TestService = DocumentSigningService<MemoryRepository, MemoryStorage, MemoryNotifier>;

pub(super) fn signing_config() -> SigningConfig {
    SigningConfig {
        public_url: "https://sign.example.com".to_string(),
    }
}

pub(super) fn upload() -> DocumentUpload {
    DocumentUpload {
        name: "Master services agreement".to_string(),
        file_name: "msa.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        uploader: "owner@acme.test".to_string(),
        bytes: PDF.to_vec(),
    }
}

pub(super) fn placement() -> SignaturePlacement {
    SignaturePlacement {
        x: 62.5,
        y: 88.0,
        page: 3,
    }
}

pub(super) fn signer(name: &str, email: &str) -> SignerDraft {
    SignerDraft {
        name: name.to_string(),
        email: email.to_string(),
        placement: placement(),
    }
}

pub(super) fn signature(action: SignAction) -> SignatureSubmission {
    SignatureSubmission {
        signature_data: Some(STANDARD.encode(b"\x89PNG signature strokes")),
        position: Some(placement()),
        action,
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryRepository>,
    Arc<MemoryStorage>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let storage = Arc::new(MemoryStorage::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = DocumentSigningService::new(
        repository.clone(),
        storage.clone(),
        notifier.clone(),
        signing_config(),
    );
    (service, repository, storage, notifier)
}

/// Upload a document and attach the given signers in order.
pub(super) fn envelope<R, S, N>(
    service: &DocumentSigningService<R, S, N>,
    signers: &[(&str, &str)],
) -> Document
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    let mut document = service.upload(upload()).expect("upload succeeds");
    for (name, email) in signers {
        document = service
            .add_signer(&document.id, signer(name, email))
            .expect("signer added");
    }
    document
}

pub(super) fn token_at(document: &Document, index: usize) -> SigningToken {
    document.signers[index].token.clone()
}

/// A draft document built without a repository, for exercising the lifecycle directly.
pub(super) fn draft_document(signers: usize) -> Document {
    let now = Utc::now();
    let mut document = Document {
        id: DocumentId("doc-fixture".to_string()),
        name: "Lease".to_string(),
        file_name: "lease.pdf".to_string(),
        file_location: "memory://doc-fixture/lease.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        size_bytes: PDF.len() as u64,
        uploader: "owner@acme.test".to_string(),
        status: DocumentStatus::Draft,
        signers: Vec::new(),
        failure_reason: None,
        created_at: now,
        updated_at: now,
        revision: 0,
    };
    for index in 0..signers {
        lifecycle::add_signer(
            &mut document,
            signer(&format!("Signer {index}"), &format!("signer{index}@acme.test")),
            SignerId(format!("doc-fixture-s{}", index + 1)),
            now,
        )
        .expect("signer added to draft");
    }
    document
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    signing_router(Arc::new(service))
}

pub(super) fn multipart_upload(boundary: &str, file: &[u8], uploader: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"uploader\"\r\n\r\n{uploader}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"nda.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) documents: Arc<Mutex<BTreeMap<DocumentId, Document>>>,
}

impl DocumentRepository for MemoryRepository {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        if guard.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    fn update(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        let current = guard.get(&document.id).ok_or(RepositoryError::NotFound)?;
        if current.revision != document.revision {
            return Err(RepositoryError::StaleRevision {
                expected: document.revision,
                found: current.revision,
            });
        }
        let mut stored = document;
        stored.revision += 1;
        guard.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_token(&self, token: &SigningToken) -> Result<Option<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|document| document.signer_by_token(token).is_some())
            .cloned())
    }

    fn list(&self, status: Option<DocumentStatus>) -> Result<Vec<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|document| status.map_or(true, |status| document.status == status))
            .cloned()
            .collect())
    }

    fn delete(&self, id: &DocumentId) -> Result<Document, RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }
}

pub(super) struct UnavailableRepository;

impl DocumentRepository for UnavailableRepository {
    fn insert(&self, _document: Document) -> Result<Document, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _document: Document) -> Result<Document, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_token(&self, _token: &SigningToken) -> Result<Option<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _status: Option<DocumentStatus>) -> Result<Vec<Document>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &DocumentId) -> Result<Document, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStorage {
    pub(super) files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub(super) fn len(&self) -> usize {
        self.files.lock().expect("storage mutex poisoned").len()
    }
}

impl DocumentStorage for MemoryStorage {
    fn put(&self, id: &DocumentId, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let location = format!("memory://{}/{}", id.0, file_name);
        self.files
            .lock()
            .expect("storage mutex poisoned")
            .insert(location.clone(), bytes.to_vec());
        Ok(location)
    }

    fn get(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .expect("storage mutex poisoned")
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::Missing(location.to_string()))
    }

    fn remove(&self, location: &str) -> Result<(), StorageError> {
        self.files
            .lock()
            .expect("storage mutex poisoned")
            .remove(location);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl NotificationDispatcher for OfflineNotifier {
    fn dispatch(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay refused connection".to_string()))
    }
}
