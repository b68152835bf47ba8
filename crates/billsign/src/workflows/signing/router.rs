use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    DocumentId, DocumentStatus, DocumentUpload, SignatureSubmission, SignerDraft, SigningToken,
};
use super::repository::{DocumentRepository, DocumentStorage, RepositoryError, StorageError};
use super::service::{DocumentSigningService, SigningServiceError};
use crate::workflows::extract::JsonBody;
use crate::workflows::notifications::NotificationDispatcher;

/// Multipart framing overhead allowed on top of the configured file limit.
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

type SharedService<R, S, N> = Arc<DocumentSigningService<R, S, N>>;

/// Router builder exposing the document registry and signing session endpoints.
pub fn signing_router<R, S, N>(service: SharedService<R, S, N>) -> Router
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    let body_limit = service.upload_limit().saturating_add(MULTIPART_SLACK_BYTES);

    Router::new()
        .route(
            "/api/documents",
            post(upload_handler::<R, S, N>).get(list_handler::<R, S, N>),
        )
        .route(
            "/api/documents/:document_id",
            get(get_handler::<R, S, N>).delete(delete_handler::<R, S, N>),
        )
        .route(
            "/api/documents/:document_id/download",
            get(download_handler::<R, S, N>),
        )
        .route(
            "/api/documents/:document_id/signers",
            post(add_signer_handler::<R, S, N>),
        )
        .route(
            "/api/documents/:document_id/send",
            post(send_handler::<R, S, N>),
        )
        .route(
            "/api/documents/:document_id/finalize",
            post(finalize_handler::<R, S, N>),
        )
        .route(
            "/api/sign/:token",
            get(session_handler::<R, S, N>).post(submit_handler::<R, S, N>),
        )
        .route("/api/sign/:token/failure", post(failure_handler::<R, S, N>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    pub(crate) status: Option<DocumentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FailureReport {
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn upload_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    mut multipart: Multipart,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut uploader = String::new();
    let mut name = String::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return multipart_error(err),
        };
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("document.pdf").to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes.to_vec())),
                    Err(err) => return multipart_error(err),
                }
            }
            Some("uploader") => match field.text().await {
                Ok(text) => uploader = text,
                Err(err) => return multipart_error(err),
            },
            Some("name") => match field.text().await {
                Ok(text) => name = text,
                Err(err) => return multipart_error(err),
            },
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return error_body(StatusCode::BAD_REQUEST, "multipart field 'file' is required");
    };

    let upload = DocumentUpload {
        name,
        file_name,
        content_type: mime::APPLICATION_PDF.to_string(),
        uploader,
        bytes,
    };

    match service.upload(upload) {
        Ok(document) => {
            (StatusCode::CREATED, Json(json!({ "document": document.view() }))).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn list_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.list(query.status) {
        Ok(documents) => {
            let views: Vec<_> = documents.iter().map(|document| document.view()).collect();
            (StatusCode::OK, Json(json!({ "documents": views }))).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn get_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    document_response(service.get(&DocumentId(document_id)), StatusCode::OK)
}

pub(crate) async fn delete_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.delete(&DocumentId(document_id)) {
        Ok(document) => (StatusCode::OK, Json(json!({ "deleted": document.id }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn download_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.download(&DocumentId(document_id)) {
        Ok((document, bytes)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, document.content_type.clone()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.file_name),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn add_signer_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
    JsonBody(draft): JsonBody<SignerDraft>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    document_response(
        service.add_signer(&DocumentId(document_id), draft),
        StatusCode::CREATED,
    )
}

pub(crate) async fn send_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    document_response(service.send(&DocumentId(document_id)), StatusCode::OK)
}

pub(crate) async fn finalize_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    document_response(service.finalize(&DocumentId(document_id)), StatusCode::OK)
}

pub(crate) async fn session_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(token): Path<String>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.session(&SigningToken(token)) {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn submit_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(token): Path<String>,
    JsonBody(submission): JsonBody<SignatureSubmission>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.submit_signature(&SigningToken(token), submission) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "documentCompleted": outcome.document_completed })),
        )
            .into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn failure_handler<R, S, N>(
    State(service): State<SharedService<R, S, N>>,
    Path(token): Path<String>,
    JsonBody(report): JsonBody<FailureReport>,
) -> Response
where
    R: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    N: NotificationDispatcher + 'static,
{
    let reason = report.reason.unwrap_or_default();
    document_response(
        service.report_failure(&SigningToken(token), &reason),
        StatusCode::OK,
    )
}

fn document_response(
    result: Result<super::domain::Document, SigningServiceError>,
    status: StatusCode,
) -> Response {
    match result {
        Ok(document) => (status, Json(json!({ "document": document.view() }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) fn service_error(err: SigningServiceError) -> Response {
    let status = match &err {
        SigningServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        SigningServiceError::Transition(_) => StatusCode::CONFLICT,
        SigningServiceError::UnknownToken => StatusCode::NOT_FOUND,
        SigningServiceError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        SigningServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SigningServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::StaleRevision { .. },
        ) => StatusCode::CONFLICT,
        SigningServiceError::Notification(_) => StatusCode::SERVICE_UNAVAILABLE,
        SigningServiceError::Repository(RepositoryError::Unavailable(_))
        | SigningServiceError::Storage(StorageError::Missing(_) | StorageError::Io(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, &err.to_string())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> Response {
    error_body(err.status(), &err.body_text())
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
