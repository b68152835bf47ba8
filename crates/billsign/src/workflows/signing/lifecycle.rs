//! Status transitions for documents and their signers.
//!
//! Every function here mutates a `Document` in memory and leaves persistence to the caller,
//! which keeps the guards testable without a repository.

use chrono::{DateTime, Utc};

use super::domain::{
    Document, DocumentStatus, SignAction, SignatureSubmission, Signer, SignerDraft, SignerId,
    SignerStatus, SigningToken, SigningValidationError,
};

/// Transition guard failures surfaced as `409 Conflict`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SigningTransitionError {
    #[error("signers can only be added while the document is a draft (status: {})", .0.label())]
    DocumentNotDraft(DocumentStatus),
    #[error("document is not awaiting signatures (status: {})", .0.label())]
    DocumentNotPending(DocumentStatus),
    #[error("document is closed (status: {})", .0.label())]
    DocumentClosed(DocumentStatus),
    #[error("document has no signers")]
    NoSigners,
    #[error("every signer has already completed; finalize the document instead")]
    NoPendingSigner,
    #[error("signing link has already been used")]
    TokenConsumed,
    #[error("this signer has not been asked to sign yet")]
    NotYourTurn,
    #[error("{remaining} signer(s) have not signed yet")]
    OutstandingSigners { remaining: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] SigningValidationError),
    #[error(transparent)]
    Transition(#[from] SigningTransitionError),
    #[error("unknown signing token")]
    UnknownToken,
}

/// Result of accepting a signature submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureOutcome {
    pub action: SignAction,
    pub signer_id: SignerId,
    pub next_signer: Option<SignerId>,
    pub document_completed: bool,
}

/// Append a signer to the end of the sequence.
pub fn add_signer(
    document: &mut Document,
    draft: SignerDraft,
    signer_id: SignerId,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if document.status != DocumentStatus::Draft {
        return Err(SigningTransitionError::DocumentNotDraft(document.status).into());
    }
    draft.validate()?;

    document.signers.push(Signer {
        id: signer_id,
        name: draft.name.trim().to_string(),
        email: draft.email.trim().to_string(),
        status: SignerStatus::Pending,
        placement: draft.placement,
        token: SigningToken::generate(),
        signature: None,
        signed_at: None,
    });
    document.updated_at = now;
    Ok(())
}

/// Pick the signer who should receive a request now.
///
/// A draft document moves to `pending_signature`. If a signer is already `sent` they are
/// returned again (a reminder) and nothing advances; otherwise the first `pending` signer
/// in list order becomes `sent`.
pub fn dispatch_next(
    document: &mut Document,
    now: DateTime<Utc>,
) -> Result<SignerId, SigningTransitionError> {
    match document.status {
        DocumentStatus::Draft => {
            if document.signers.is_empty() {
                return Err(SigningTransitionError::NoSigners);
            }
        }
        DocumentStatus::PendingSignature => {}
        status => return Err(SigningTransitionError::DocumentClosed(status)),
    }

    if let Some(waiting) = document
        .signers
        .iter()
        .find(|signer| signer.status == SignerStatus::Sent)
    {
        return Ok(waiting.id.clone());
    }

    let next = advance_to_next_pending(document).ok_or(SigningTransitionError::NoPendingSigner)?;
    document.status = DocumentStatus::PendingSignature;
    document.updated_at = now;
    Ok(next)
}

fn advance_to_next_pending(document: &mut Document) -> Option<SignerId> {
    let next = document
        .signers
        .iter_mut()
        .find(|signer| signer.status == SignerStatus::Pending)?;
    next.status = SignerStatus::Sent;
    Some(next.id.clone())
}

/// Apply a signing-session submission for the signer holding `token`.
pub fn record_signature(
    document: &mut Document,
    token: &SigningToken,
    submission: &SignatureSubmission,
    now: DateTime<Utc>,
) -> Result<SignatureOutcome, LifecycleError> {
    let index = signer_index(document, token)?;
    match document.signers[index].status {
        SignerStatus::Signed | SignerStatus::Failed => {
            return Err(SigningTransitionError::TokenConsumed.into())
        }
        SignerStatus::Pending => {
            if document.status == DocumentStatus::PendingSignature {
                return Err(SigningTransitionError::NotYourTurn.into());
            }
        }
        SignerStatus::Sent => {}
    }
    if document.status != DocumentStatus::PendingSignature {
        return Err(SigningTransitionError::DocumentNotPending(document.status).into());
    }

    let signer = &mut document.signers[index];
    let captured = submission.capture(signer.signature.as_ref(), now)?;
    signer.signature = Some(captured);
    let signer_id = signer.id.clone();

    let mut outcome = SignatureOutcome {
        action: submission.action,
        signer_id,
        next_signer: None,
        document_completed: false,
    };

    match submission.action {
        SignAction::Draft => {}
        SignAction::Save | SignAction::SaveAndSend => {
            signer.status = SignerStatus::Signed;
            signer.signed_at = Some(now);

            if submission.action == SignAction::SaveAndSend {
                outcome.next_signer = advance_to_next_pending(document);
                if outcome.next_signer.is_none() && document.all_signed() {
                    document.status = DocumentStatus::Signed;
                    outcome.document_completed = true;
                }
            }
        }
    }

    document.updated_at = now;
    Ok(outcome)
}

/// Close out a document whose signers have all signed.
pub fn finalize(document: &mut Document, now: DateTime<Utc>) -> Result<(), SigningTransitionError> {
    if document.status != DocumentStatus::PendingSignature {
        return Err(SigningTransitionError::DocumentNotPending(document.status));
    }
    let remaining = document
        .signers
        .iter()
        .filter(|signer| signer.status != SignerStatus::Signed)
        .count();
    if remaining > 0 || document.signers.is_empty() {
        return Err(SigningTransitionError::OutstandingSigners { remaining });
    }

    document.status = DocumentStatus::Signed;
    document.updated_at = now;
    Ok(())
}

/// Mark the signer holding `token` and the document as failed.
pub fn record_failure(
    document: &mut Document,
    token: &SigningToken,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<SignerId, LifecycleError> {
    let index = signer_index(document, token)?;
    if document.status.is_terminal() {
        return Err(SigningTransitionError::DocumentClosed(document.status).into());
    }
    if matches!(
        document.signers[index].status,
        SignerStatus::Signed | SignerStatus::Failed
    ) {
        return Err(SigningTransitionError::TokenConsumed.into());
    }

    let reason = reason.trim();
    let reason = if reason.is_empty() {
        "signer reported a failure".to_string()
    } else {
        reason.to_string()
    };

    let signer = &mut document.signers[index];
    signer.status = SignerStatus::Failed;
    let signer_id = signer.id.clone();

    document.status = DocumentStatus::Failed;
    document.failure_reason = Some(reason);
    document.updated_at = now;
    Ok(signer_id)
}

fn signer_index(document: &Document, token: &SigningToken) -> Result<usize, LifecycleError> {
    document
        .signers
        .iter()
        .position(|signer| &signer.token == token)
        .ok_or(LifecycleError::UnknownToken)
}
