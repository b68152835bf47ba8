use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Identifier wrapper for signers attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerId(pub String);

/// Opaque credential granting one signer access to one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningToken(pub String);

impl SigningToken {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    PendingSignature,
    Signed,
    Failed,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::PendingSignature => "pending_signature",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Signed | DocumentStatus::Failed)
    }
}

/// Per-recipient progress through the signing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    Pending,
    Sent,
    Signed,
    Failed,
}

impl SignerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SignerStatus::Pending => "pending",
            SignerStatus::Sent => "sent",
            SignerStatus::Signed => "signed",
            SignerStatus::Failed => "failed",
        }
    }
}

/// Signature field location, in percent of the page and 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignaturePlacement {
    pub x: f64,
    pub y: f64,
    pub page: u32,
}

impl SignaturePlacement {
    pub fn validate(&self) -> Result<(), SigningValidationError> {
        let in_range = |value: f64| value.is_finite() && (0.0..=100.0).contains(&value);
        if !in_range(self.x) || !in_range(self.y) {
            return Err(SigningValidationError::PlacementOutOfRange {
                x: self.x,
                y: self.y,
            });
        }
        if self.page == 0 {
            return Err(SigningValidationError::InvalidPage);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignAction {
    Save,
    SaveAndSend,
    Draft,
}

/// Body accepted by the signing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureSubmission {
    #[serde(default)]
    pub signature_data: Option<String>,
    #[serde(default)]
    pub position: Option<SignaturePlacement>,
    pub action: SignAction,
}

/// Signature image and placement accepted from a signer. Drafts may hold only one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSignature {
    pub signature_data: Option<String>,
    pub position: Option<SignaturePlacement>,
    pub captured_at: DateTime<Utc>,
}

impl CapturedSignature {
    pub fn is_complete(&self) -> bool {
        self.signature_data.is_some() && self.position.is_some()
    }
}

impl SignatureSubmission {
    /// Validate the payload against any previously saved draft. Fields left out of the
    /// submission fall back to the draft; `save` and `save_and_send` need both in the end.
    pub fn capture(
        &self,
        previous: Option<&CapturedSignature>,
        now: DateTime<Utc>,
    ) -> Result<CapturedSignature, SigningValidationError> {
        let submitted = self
            .signature_data
            .as_deref()
            .map(str::trim)
            .filter(|data| !data.is_empty());

        let signature_data = match submitted {
            Some(data) => {
                let encoded = strip_data_url(data);
                STANDARD
                    .decode(encoded)
                    .map_err(|_| SigningValidationError::MalformedSignature)?;
                Some(encoded.to_string())
            }
            None => previous.and_then(|draft| draft.signature_data.clone()),
        };

        if let Some(position) = &self.position {
            position.validate()?;
        }
        let position = self
            .position
            .or_else(|| previous.and_then(|draft| draft.position));

        match self.action {
            SignAction::Draft if signature_data.is_none() && position.is_none() => {
                return Err(SigningValidationError::MissingSignature);
            }
            SignAction::Draft => {}
            SignAction::Save | SignAction::SaveAndSend => {
                if signature_data.is_none() {
                    return Err(SigningValidationError::MissingSignature);
                }
                if position.is_none() {
                    return Err(SigningValidationError::MissingPosition);
                }
            }
        }

        Ok(CapturedSignature {
            signature_data,
            position,
            captured_at: now,
        })
    }
}

fn strip_data_url(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    }
}

/// Recipient attached to a document, in signing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signer {
    pub id: SignerId,
    pub name: String,
    pub email: String,
    pub status: SignerStatus,
    pub placement: SignaturePlacement,
    pub token: SigningToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<CapturedSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Signer {
    pub fn view(&self) -> SignerView {
        SignerView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
            placement: self.placement,
            signed_at: self.signed_at,
            has_saved_signature: self.signature.is_some(),
        }
    }
}

/// Request to attach a new signer to a draft document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerDraft {
    pub name: String,
    pub email: String,
    pub placement: SignaturePlacement,
}

impl SignerDraft {
    pub fn validate(&self) -> Result<(), SigningValidationError> {
        if self.name.trim().is_empty() {
            return Err(SigningValidationError::MissingSignerName);
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(SigningValidationError::InvalidEmail(self.email.clone()));
        }
        self.placement.validate()
    }
}

/// Metadata captured when a file is uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpload {
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub uploader: String,
    pub bytes: Vec<u8>,
}

/// The envelope: an uploaded file plus its ordered signers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub file_name: String,
    pub file_location: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploader: String,
    pub status: DocumentStatus,
    pub signers: Vec<Signer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every persisted change; repositories reject stale writes.
    pub revision: u64,
}

impl Document {
    pub fn signer(&self, id: &SignerId) -> Option<&Signer> {
        self.signers.iter().find(|signer| &signer.id == id)
    }

    pub fn signer_by_token(&self, token: &SigningToken) -> Option<&Signer> {
        self.signers.iter().find(|signer| &signer.token == token)
    }

    pub fn all_signed(&self) -> bool {
        !self.signers.is_empty()
            && self
                .signers
                .iter()
                .all(|signer| signer.status == SignerStatus::Signed)
    }

    pub fn view(&self) -> DocumentView {
        DocumentView {
            id: self.id.clone(),
            name: self.name.clone(),
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size_bytes: self.size_bytes,
            uploader: self.uploader.clone(),
            status: self.status,
            signers: self.signers.iter().map(Signer::view).collect(),
            failure_reason: self.failure_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public representation of a signer; never exposes the token or signature image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerView {
    pub id: SignerId,
    pub name: String,
    pub email: String,
    pub status: SignerStatus,
    pub placement: SignaturePlacement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    pub has_saved_signature: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub id: DocumentId,
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploader: String,
    pub status: DocumentStatus,
    pub signers: Vec<SignerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input validation failures surfaced as `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SigningValidationError {
    #[error("signatureData is required")]
    MissingSignature,
    #[error("signatureData must be base64 encoded")]
    MalformedSignature,
    #[error("position is required")]
    MissingPosition,
    #[error("position must be within 0-100% of the page (x={x}, y={y})")]
    PlacementOutOfRange { x: f64, y: f64 },
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error("signer name is required")]
    MissingSignerName,
    #[error("invalid signer email '{0}'")]
    InvalidEmail(String),
    #[error("uploader is required")]
    MissingUploader,
    #[error("only PDF documents are supported")]
    NotPdf,
    #[error("uploaded file is empty")]
    EmptyFile,
}
