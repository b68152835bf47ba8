//! Document e-signature workflow: upload, place signature fields, route the envelope to
//! signers in order, and close it out once everyone has signed.

pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CapturedSignature, Document, DocumentId, DocumentStatus, DocumentUpload, DocumentView,
    SignAction, SignatureSubmission, SignaturePlacement, Signer, SignerDraft, SignerId,
    SignerStatus, SignerView, SigningToken, SigningValidationError,
};
pub use lifecycle::{SignatureOutcome, SigningTransitionError};
pub use repository::{DocumentRepository, DocumentStorage, RepositoryError, StorageError};
pub use router::signing_router;
pub use service::{DocumentSigningService, SigningServiceError, SigningSession};
