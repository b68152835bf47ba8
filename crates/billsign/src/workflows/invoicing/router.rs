use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CustomerDraft, CustomerId, Invoice, InvoiceDraft, InvoiceId, PaymentDraft, PaymentId,
};
use super::repository::{InvoicingRepository, RepositoryError};
use super::service::{InvoicingService, InvoicingServiceError};
use crate::workflows::extract::JsonBody;
use crate::workflows::notifications::NotificationDispatcher;

type SharedService<R, N> = Arc<InvoicingService<R, N>>;

/// Router builder for customers, invoices, and payments.
pub fn invoicing_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/customers",
            post(create_customer_handler::<R, N>).get(list_customers_handler::<R, N>),
        )
        .route(
            "/api/customers/:customer_id",
            get(get_customer_handler::<R, N>)
                .put(update_customer_handler::<R, N>)
                .delete(delete_customer_handler::<R, N>),
        )
        .route(
            "/api/invoices",
            post(create_invoice_handler::<R, N>).get(list_invoices_handler::<R, N>),
        )
        .route("/api/invoices/export", get(export_handler::<R, N>))
        .route(
            "/api/invoices/:invoice_id",
            get(get_invoice_handler::<R, N>)
                .put(update_invoice_handler::<R, N>)
                .delete(delete_invoice_handler::<R, N>),
        )
        .route(
            "/api/invoices/:invoice_id/send",
            post(send_invoice_handler::<R, N>),
        )
        .route(
            "/api/invoices/:invoice_id/payments",
            get(list_payments_handler::<R, N>),
        )
        .route("/api/payments", post(record_payment_handler::<R, N>))
        .route(
            "/api/payments/:payment_id",
            delete(delete_payment_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvoiceQuery {
    #[serde(default)]
    pub(crate) customer_id: Option<String>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) async fn create_customer_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    JsonBody(draft): JsonBody<CustomerDraft>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.create_customer(draft) {
        Ok(customer) => (StatusCode::CREATED, Json(json!({ "customer": customer }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn list_customers_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.list_customers() {
        Ok(customers) => (StatusCode::OK, Json(json!({ "customers": customers }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn get_customer_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(customer_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.customer(&CustomerId(customer_id)) {
        Ok(customer) => (StatusCode::OK, Json(json!({ "customer": customer }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn update_customer_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(customer_id): Path<String>,
    JsonBody(draft): JsonBody<CustomerDraft>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.update_customer(&CustomerId(customer_id), draft) {
        Ok(customer) => (StatusCode::OK, Json(json!({ "customer": customer }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn delete_customer_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(customer_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.delete_customer(&CustomerId(customer_id)) {
        Ok(customer) => (StatusCode::OK, Json(json!({ "deleted": customer.id }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn create_invoice_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    JsonBody(draft): JsonBody<InvoiceDraft>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    invoice_response(service.create_invoice(draft), StatusCode::CREATED)
}

pub(crate) async fn list_invoices_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<InvoiceQuery>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let customer = query.customer_id.map(CustomerId);
    match service.list_invoices(customer.as_ref()) {
        Ok(invoices) => {
            let today = today();
            let views: Vec<_> = invoices.iter().map(|invoice| invoice.view(today)).collect();
            (StatusCode::OK, Json(json!({ "invoices": views }))).into_response()
        }
        Err(err) => service_error(err),
    }
}

pub(crate) async fn get_invoice_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    invoice_response(service.invoice(&InvoiceId(invoice_id)), StatusCode::OK)
}

pub(crate) async fn update_invoice_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(invoice_id): Path<String>,
    JsonBody(draft): JsonBody<InvoiceDraft>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    invoice_response(
        service.update_invoice(&InvoiceId(invoice_id), draft),
        StatusCode::OK,
    )
}

pub(crate) async fn delete_invoice_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.delete_invoice(&InvoiceId(invoice_id)) {
        Ok(invoice) => (StatusCode::OK, Json(json!({ "deleted": invoice.id }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn send_invoice_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    invoice_response(service.send_invoice(&InvoiceId(invoice_id)), StatusCode::OK)
}

pub(crate) async fn list_payments_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(invoice_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.payments(&InvoiceId(invoice_id)) {
        Ok(payments) => (StatusCode::OK, Json(json!({ "payments": payments }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn record_payment_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    JsonBody(draft): JsonBody<PaymentDraft>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.record_payment(draft) {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(json!({
                "payment": recorded.payment,
                "invoice": recorded.invoice.view(today()),
            })),
        )
            .into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn delete_payment_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(payment_id): Path<String>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    invoice_response(
        service.delete_payment(&PaymentId(payment_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn export_handler<R, N>(State(service): State<SharedService<R, N>>) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.export_csv(today()) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"invoices.csv\"".to_string(),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => service_error(err),
    }
}

fn invoice_response(result: Result<Invoice, InvoicingServiceError>, status: StatusCode) -> Response {
    match result {
        Ok(invoice) => (status, Json(json!({ "invoice": invoice.view(today()) }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) fn service_error(err: InvoicingServiceError) -> Response {
    let status = match &err {
        InvoicingServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        InvoicingServiceError::CustomerNotFound
        | InvoicingServiceError::InvoiceNotFound
        | InvoicingServiceError::PaymentNotFound
        | InvoicingServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        InvoicingServiceError::CustomerHasInvoices { .. }
        | InvoicingServiceError::InvoiceLocked
        | InvoicingServiceError::AlreadyPaid
        | InvoicingServiceError::NothingOwed
        | InvoicingServiceError::Overpayment { .. }
        | InvoicingServiceError::Repository(
            RepositoryError::Conflict | RepositoryError::StaleRevision { .. },
        ) => StatusCode::CONFLICT,
        InvoicingServiceError::Notification(_) => StatusCode::SERVICE_UNAVAILABLE,
        InvoicingServiceError::Repository(RepositoryError::Unavailable(_))
        | InvoicingServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
