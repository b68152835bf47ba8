use super::domain::{Document, DocumentId, DocumentStatus, SigningToken};
pub use crate::workflows::repository::RepositoryError;

/// Storage abstraction for document metadata and signers.
///
/// `update` is a compare-and-swap on `Document::revision`: implementations must reject a
/// write whose revision differs from the stored one and bump the revision on success.
pub trait DocumentRepository: Send + Sync {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError>;
    fn update(&self, document: Document) -> Result<Document, RepositoryError>;
    fn fetch(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    fn find_by_token(&self, token: &SigningToken) -> Result<Option<Document>, RepositoryError>;
    fn list(&self, status: Option<DocumentStatus>) -> Result<Vec<Document>, RepositoryError>;
    fn delete(&self, id: &DocumentId) -> Result<Document, RepositoryError>;
}

/// Blob storage for uploaded files. Returns an opaque location string on write.
pub trait DocumentStorage: Send + Sync {
    fn put(&self, id: &DocumentId, file_name: &str, bytes: &[u8]) -> Result<String, StorageError>;
    fn get(&self, location: &str) -> Result<Vec<u8>, StorageError>;
    fn remove(&self, location: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("stored file '{0}' is missing")]
    Missing(String),
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
}
