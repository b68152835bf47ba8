use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::gateway::{GatewayError, HostedSigningRequest};
use super::service::{IntegrationError, IntegrationService};
use crate::workflows::invoicing::{router as invoicing, InvoiceId, InvoicingRepository};
use crate::workflows::extract::JsonBody;
use crate::workflows::notifications::NotificationDispatcher;

type SharedService<R, N> = Arc<IntegrationService<R, N>>;

pub fn integrations_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/api/stripe/checkout", post(checkout_handler::<R, N>))
        .route("/api/docuseal", post(hosted_signing_handler::<R, N>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutPayload {
    #[serde(default)]
    pub(crate) invoice_id: Option<String>,
}

pub(crate) async fn checkout_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    JsonBody(payload): JsonBody<CheckoutPayload>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let Some(invoice_id) = payload.invoice_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invoiceId is required" })),
        )
            .into_response();
    };

    match service.checkout(&InvoiceId(invoice_id)).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => integration_error(err),
    }
}

pub(crate) async fn hosted_signing_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    JsonBody(request): JsonBody<HostedSigningRequest>,
) -> Response
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.hosted_signing(request).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => integration_error(err),
    }
}

pub(crate) fn integration_error(err: IntegrationError) -> Response {
    let status = match err {
        IntegrationError::Invoicing(inner) => return invoicing::service_error(inner),
        IntegrationError::Gateway(GatewayError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        IntegrationError::Gateway(GatewayError::Unconfigured(_) | GatewayError::Upstream { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
