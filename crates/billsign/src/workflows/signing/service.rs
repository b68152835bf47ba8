use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Document, DocumentId, DocumentStatus, DocumentUpload, DocumentView, SignatureSubmission,
    SignerDraft, SignerId, SignerStatus, SignerView, SigningToken, SigningValidationError,
};
use super::lifecycle::{
    self, LifecycleError, SignatureOutcome, SigningTransitionError,
};
use super::repository::{DocumentRepository, DocumentStorage, RepositoryError, StorageError};
use crate::config::SigningConfig;
use crate::workflows::notifications::{
    Notification, NotificationDispatcher, NotificationError, NotificationTemplate,
};

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const DEFAULT_UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_document_id() -> DocumentId {
    let id = DOCUMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DocumentId(format!("doc-{id:06}"))
}

/// What a signer sees after opening their link.
#[derive(Debug, Clone, Serialize)]
pub struct SigningSession {
    pub document: DocumentView,
    pub signer: SignerView,
}

/// Service composing the document registry, file storage, and signer notifications.
pub struct DocumentSigningService<R, S, N> {
    repository: Arc<R>,
    storage: Arc<S>,
    notifier: Arc<N>,
    config: SigningConfig,
    upload_limit: usize,
}

impl<R, S, N> DocumentSigningService<R, S, N>
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>, notifier: Arc<N>, config: SigningConfig) -> Self {
        Self {
            repository,
            storage,
            notifier,
            config,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_upload_limit(mut self, bytes: usize) -> Self {
        self.upload_limit = bytes;
        self
    }

    pub fn upload_limit(&self) -> usize {
        self.upload_limit
    }

    /// Store an uploaded PDF and register it as a draft document.
    pub fn upload(&self, upload: DocumentUpload) -> Result<Document, SigningServiceError> {
        let uploader = upload.uploader.trim();
        if uploader.is_empty() {
            return Err(SigningValidationError::MissingUploader.into());
        }
        if upload.bytes.is_empty() {
            return Err(SigningValidationError::EmptyFile.into());
        }
        if upload.bytes.len() > self.upload_limit {
            return Err(SigningServiceError::TooLarge {
                limit: self.upload_limit,
            });
        }
        if !upload.bytes.starts_with(PDF_SIGNATURE) {
            return Err(SigningValidationError::NotPdf.into());
        }

        let id = next_document_id();
        let file_name = sanitize_file_name(&upload.file_name);
        let name = match upload.name.trim() {
            "" => display_name(&file_name),
            name => name.to_string(),
        };
        let location = self.storage.put(&id, &file_name, &upload.bytes)?;

        let now = Utc::now();
        let document = Document {
            id: id.clone(),
            name,
            file_name,
            file_location: location.clone(),
            content_type: upload.content_type,
            size_bytes: upload.bytes.len() as u64,
            uploader: uploader.to_string(),
            status: DocumentStatus::Draft,
            signers: Vec::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        match self.repository.insert(document) {
            Ok(stored) => {
                info!(document_id = %stored.id.0, size = stored.size_bytes, "document uploaded");
                Ok(stored)
            }
            Err(err) => {
                if let Err(cleanup) = self.storage.remove(&location) {
                    warn!(document_id = %id.0, error = %cleanup, "failed to remove orphaned upload");
                }
                Err(err.into())
            }
        }
    }

    pub fn list(&self, status: Option<DocumentStatus>) -> Result<Vec<Document>, SigningServiceError> {
        Ok(self.repository.list(status)?)
    }

    pub fn get(&self, id: &DocumentId) -> Result<Document, SigningServiceError> {
        let document = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(document)
    }

    /// Fetch the document together with its original bytes.
    pub fn download(&self, id: &DocumentId) -> Result<(Document, Vec<u8>), SigningServiceError> {
        let document = self.get(id)?;
        let bytes = self.storage.get(&document.file_location)?;
        Ok((document, bytes))
    }

    /// Remove a document, its signers, and the stored file. Issued tokens stop resolving.
    pub fn delete(&self, id: &DocumentId) -> Result<Document, SigningServiceError> {
        let removed = self.repository.delete(id)?;
        if let Err(err) = self.storage.remove(&removed.file_location) {
            warn!(document_id = %id.0, error = %err, "document deleted but file removal failed");
        }
        info!(document_id = %id.0, signers = removed.signers.len(), "document deleted");
        Ok(removed)
    }

    pub fn add_signer(
        &self,
        id: &DocumentId,
        draft: SignerDraft,
    ) -> Result<Document, SigningServiceError> {
        let mut document = self.get(id)?;
        let signer_id = SignerId(format!("{}-s{}", id.0, document.signers.len() + 1));
        lifecycle::add_signer(&mut document, draft, signer_id, Utc::now())?;
        Ok(self.repository.update(document)?)
    }

    /// Route the document to the next signer in sequence (or remind the one already asked).
    ///
    /// If the request cannot be delivered the stored document is put back as it was, so a
    /// retried send targets the same signer.
    pub fn send(&self, id: &DocumentId) -> Result<Document, SigningServiceError> {
        let mut document = self.get(id)?;
        let previous = document.clone();
        let signer_id = lifecycle::dispatch_next(&mut document, Utc::now())?;
        let stored = self.repository.update(document)?;

        if let Err(err) = self
            .notifier
            .dispatch(self.signature_request(&stored, &signer_id))
        {
            let restored = Document {
                revision: stored.revision,
                ..previous
            };
            if let Err(rollback) = self.repository.update(restored) {
                warn!(document_id = %id.0, error = %rollback, "failed to roll back send");
            }
            return Err(err.into());
        }
        info!(document_id = %stored.id.0, signer_id = %signer_id.0, "signature requested");
        Ok(stored)
    }

    /// Countersign: close a document whose signers have all signed.
    pub fn finalize(&self, id: &DocumentId) -> Result<Document, SigningServiceError> {
        let mut document = self.get(id)?;
        lifecycle::finalize(&mut document, Utc::now())?;
        let stored = self.repository.update(document)?;
        self.notify_best_effort(completion_notice(&stored));
        info!(document_id = %stored.id.0, "document finalized");
        Ok(stored)
    }

    /// Resolve a signing link. Links stop working once their signer has signed or failed.
    pub fn session(&self, token: &SigningToken) -> Result<SigningSession, SigningServiceError> {
        let document = self.by_token(token)?;
        let signer = document
            .signer_by_token(token)
            .ok_or(SigningServiceError::UnknownToken)?;
        if matches!(signer.status, SignerStatus::Signed | SignerStatus::Failed) {
            return Err(SigningTransitionError::TokenConsumed.into());
        }

        Ok(SigningSession {
            signer: signer.view(),
            document: document.view(),
        })
    }

    pub fn submit_signature(
        &self,
        token: &SigningToken,
        submission: SignatureSubmission,
    ) -> Result<SignatureOutcome, SigningServiceError> {
        let mut document = self.by_token(token)?;
        let outcome = lifecycle::record_signature(&mut document, token, &submission, Utc::now())?;
        let stored = self.repository.update(document)?;

        info!(
            document_id = %stored.id.0,
            signer_id = %outcome.signer_id.0,
            action = ?outcome.action,
            completed = outcome.document_completed,
            "signature recorded"
        );

        if let Some(next) = &outcome.next_signer {
            self.notify_best_effort(self.signature_request(&stored, next));
        }
        if outcome.document_completed {
            self.notify_best_effort(completion_notice(&stored));
        }
        Ok(outcome)
    }

    pub fn report_failure(
        &self,
        token: &SigningToken,
        reason: &str,
    ) -> Result<Document, SigningServiceError> {
        let mut document = self.by_token(token)?;
        let signer_id = lifecycle::record_failure(&mut document, token, reason, Utc::now())?;
        let stored = self.repository.update(document)?;

        warn!(document_id = %stored.id.0, signer_id = %signer_id.0, "signing failed");
        let notice = Notification::new(
            NotificationTemplate::DocumentFailed,
            stored.uploader.clone(),
            format!("Signing failed for \"{}\"", stored.name),
        )
        .detail("document_id", stored.id.0.clone())
        .detail("signer_id", signer_id.0)
        .detail(
            "reason",
            stored.failure_reason.clone().unwrap_or_default(),
        );
        self.notify_best_effort(notice);
        Ok(stored)
    }

    fn by_token(&self, token: &SigningToken) -> Result<Document, SigningServiceError> {
        self.repository
            .find_by_token(token)?
            .ok_or(SigningServiceError::UnknownToken)
    }

    fn signature_request(&self, document: &Document, signer_id: &SignerId) -> Notification {
        let signer = document.signer(signer_id);
        let (recipient, name, link) = match signer {
            Some(signer) => (
                signer.email.clone(),
                signer.name.clone(),
                self.config.signing_link(&signer.token.0),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        Notification::new(
            NotificationTemplate::SignatureRequested,
            recipient,
            format!("Please sign \"{}\"", document.name),
        )
        .detail("document_id", document.id.0.clone())
        .detail("signer_name", name)
        .detail("signing_link", link)
    }

    fn notify_best_effort(&self, notification: Notification) {
        let template = notification.template.label();
        if let Err(err) = self.notifier.dispatch(notification) {
            warn!(template, error = %err, "notification dispatch failed");
        }
    }
}

fn completion_notice(document: &Document) -> Notification {
    Notification::new(
        NotificationTemplate::DocumentCompleted,
        document.uploader.clone(),
        format!("\"{}\" has been signed by all parties", document.name),
    )
    .detail("document_id", document.id.0.clone())
    .detail("signers", document.signers.len().to_string())
}

fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}

fn display_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.replace(['_', '-'], " "),
        _ => file_name.to_string(),
    }
}

/// Error raised by the signing service.
#[derive(Debug, thiserror::Error)]
pub enum SigningServiceError {
    #[error(transparent)]
    Validation(#[from] SigningValidationError),
    #[error(transparent)]
    Transition(#[from] SigningTransitionError),
    #[error("unknown signing token")]
    UnknownToken,
    #[error("uploaded file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl From<LifecycleError> for SigningServiceError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::Validation(err) => Self::Validation(err),
            LifecycleError::Transition(err) => Self::Transition(err),
            LifecycleError::UnknownToken => Self::UnknownToken,
        }
    }
}
