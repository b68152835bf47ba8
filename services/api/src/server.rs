use crate::cli::ServeArgs;
use crate::gateways::{checkout_gateway, hosted_signing_gateway};
use crate::infra::{
    AppState, DiskDocumentStorage, InMemoryDocumentRepository, InMemoryLedger, TracingNotifier,
};
use crate::routes::{application_router, Services};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use billsign::config::AppConfig;
use billsign::error::AppError;
use billsign::telemetry;
use billsign::workflows::integrations::{IntegrationError, IntegrationService};
use billsign::workflows::invoicing::InvoicingService;
use billsign::workflows::signing::DocumentSigningService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(dir) = args.storage_dir.take() {
        config.storage.root = dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let notifier = Arc::new(TracingNotifier::default());
    let storage = Arc::new(DiskDocumentStorage::new(&config.storage.root)?);
    let signing = DocumentSigningService::new(
        Arc::new(InMemoryDocumentRepository::default()),
        storage,
        notifier.clone(),
        config.signing.clone(),
    )
    .with_upload_limit(config.storage.max_upload_bytes);

    let invoicing = Arc::new(InvoicingService::new(
        Arc::new(InMemoryLedger::default()),
        notifier,
    ));

    let integrations = &config.integrations;
    let checkout =
        checkout_gateway(integrations, &config.signing.public_url).map_err(IntegrationError::from)?;
    let hosted_signing = hosted_signing_gateway(integrations).map_err(IntegrationError::from)?;
    if integrations.stripe_secret_key.is_none() {
        warn!("STRIPE_SECRET_KEY not set; checkout endpoint will answer 503");
    }
    if integrations.docuseal_api_key.is_none() {
        warn!("DOCUSEAL_API_KEY not set; hosted signing endpoint will answer 503");
    }
    let integration_service = IntegrationService::new(
        invoicing.clone(),
        checkout,
        hosted_signing,
        integrations.currency.clone(),
    );

    let app = application_router(Services {
        signing: Arc::new(signing),
        invoicing,
        integrations: Arc::new(integration_service),
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        storage = %config.storage.root.display(),
        "billsign api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
