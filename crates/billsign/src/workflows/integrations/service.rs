use std::sync::Arc;

use tracing::{info, warn};

use super::gateway::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, HostedSigningGateway,
    HostedSigningRequest, HostedSigningSession,
};
use crate::workflows::invoicing::{
    InvoiceId, InvoicingRepository, InvoicingService, InvoicingServiceError,
};
use crate::workflows::notifications::NotificationDispatcher;

/// Bridges the invoicing ledger and the hosted signing flow to external providers.
pub struct IntegrationService<R, N> {
    invoicing: Arc<InvoicingService<R, N>>,
    checkout: Arc<dyn CheckoutGateway>,
    hosted_signing: Arc<dyn HostedSigningGateway>,
    currency: String,
}

impl<R, N> IntegrationService<R, N>
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        invoicing: Arc<InvoicingService<R, N>>,
        checkout: Arc<dyn CheckoutGateway>,
        hosted_signing: Arc<dyn HostedSigningGateway>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            invoicing,
            checkout,
            hosted_signing,
            currency: currency.into(),
        }
    }

    /// Open a checkout session for whatever is still owed on the invoice.
    pub async fn checkout(&self, invoice_id: &InvoiceId) -> Result<CheckoutSession, IntegrationError> {
        let balance = self.invoicing.outstanding_balance(invoice_id)?;
        let request = CheckoutRequest {
            invoice_id: balance.invoice_id.0,
            invoice_number: balance.number,
            amount_cents: balance.amount_cents,
            currency: self.currency.clone(),
            customer_email: balance.customer_email,
        };

        match self.checkout.create_session(request).await {
            Ok(session) => {
                info!(invoice_id = %invoice_id.0, amount_cents = balance.amount_cents, "checkout session created");
                Ok(session)
            }
            Err(err) => {
                warn!(invoice_id = %invoice_id.0, error = %err, "checkout session failed");
                Err(err.into())
            }
        }
    }

    pub async fn hosted_signing(
        &self,
        request: HostedSigningRequest,
    ) -> Result<HostedSigningSession, IntegrationError> {
        request.validate()?;
        let template_id = request.template_id.clone();
        match self.hosted_signing.create_submission(request).await {
            Ok(session) => {
                info!(template_id = %template_id, "hosted signing submission created");
                Ok(session)
            }
            Err(err) => {
                warn!(template_id = %template_id, error = %err, "hosted signing submission failed");
                Err(err.into())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error(transparent)]
    Invoicing(#[from] InvoicingServiceError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
