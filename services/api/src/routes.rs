use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use billsign::workflows::integrations::{integrations_router, IntegrationService};
use billsign::workflows::invoicing::{invoicing_router, InvoicingRepository, InvoicingService};
use billsign::workflows::notifications::NotificationDispatcher;
use billsign::workflows::signing::{
    signing_router, DocumentRepository, DocumentSigningService, DocumentStorage,
};
use serde_json::json;
use std::sync::Arc;

/// Workflow services mounted by the HTTP application.
pub(crate) struct Services<D, S, L, N> {
    pub(crate) signing: Arc<DocumentSigningService<D, S, N>>,
    pub(crate) invoicing: Arc<InvoicingService<L, N>>,
    pub(crate) integrations: Arc<IntegrationService<L, N>>,
}

pub(crate) fn application_router<D, S, L, N>(services: Services<D, S, L, N>) -> Router
where
    D: DocumentRepository + 'static,
    S: DocumentStorage + 'static,
    L: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    signing_router(services.signing)
        .merge(invoicing_router(services.invoicing))
        .merge(integrations_router(services.integrations))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
