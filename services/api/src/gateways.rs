use async_trait::async_trait;
use billsign::config::IntegrationConfig;
use billsign::workflows::integrations::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, HostedSigningGateway,
    HostedSigningRequest, HostedSigningSession, Unconfigured,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

fn upstream(provider: &'static str, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Upstream {
        provider,
        message: err.to_string(),
    }
}

fn http_client(provider: &'static str) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| upstream(provider, err))
}

/// Stripe Checkout sessions priced from the invoice's remaining balance.
pub(crate) struct StripeCheckoutGateway {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
    public_url: String,
}

impl StripeCheckoutGateway {
    pub(crate) fn new(
        api_url: &str,
        secret_key: String,
        public_url: &str,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client("stripe")?,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    fn form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("mode", "payment".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Invoice {}", request.invoice_number),
            ),
            (
                "success_url",
                format!("{}/invoices/{}?paid=1", self.public_url, request.invoice_id),
            ),
            (
                "cancel_url",
                format!("{}/invoices/{}", self.public_url, request.invoice_id),
            ),
            ("metadata[invoice_id]", request.invoice_id.clone()),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email", email.clone()));
        }
        form
    }
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    url: Option<String>,
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .form(&self.form(&request))
            .send()
            .await
            .map_err(|err| upstream("stripe", err))?
            .error_for_status()
            .map_err(|err| upstream("stripe", err))?;

        let session: StripeSession = response
            .json()
            .await
            .map_err(|err| upstream("stripe", err))?;
        let session_url = session
            .url
            .ok_or_else(|| upstream("stripe", "checkout session has no url"))?;
        Ok(CheckoutSession { session_url })
    }
}

/// DocuSeal submissions; the first submitter's slug is the embeddable token.
pub(crate) struct DocusealGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl DocusealGateway {
    pub(crate) fn new(api_url: &str, api_key: String) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client("docuseal")?,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DocusealSubmitter {
    slug: String,
}

#[async_trait]
impl HostedSigningGateway for DocusealGateway {
    async fn create_submission(
        &self,
        request: HostedSigningRequest,
    ) -> Result<HostedSigningSession, GatewayError> {
        let mut submitter = json!({ "email": request.email.trim() });
        if let Some(name) = request.name.as_deref().filter(|name| !name.trim().is_empty()) {
            submitter["name"] = json!(name.trim());
        }
        let body = json!({
            "template_id": request.template_id,
            "send_email": false,
            "submitters": [submitter],
        });

        let response = self
            .client
            .post(format!("{}/submissions", self.api_url))
            .header("X-Auth-Token", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| upstream("docuseal", err))?
            .error_for_status()
            .map_err(|err| upstream("docuseal", err))?;

        let submitters: Vec<DocusealSubmitter> = response
            .json()
            .await
            .map_err(|err| upstream("docuseal", err))?;
        let token = submitters
            .into_iter()
            .next()
            .map(|submitter| submitter.slug)
            .ok_or_else(|| upstream("docuseal", "submission returned no submitters"))?;
        Ok(HostedSigningSession { token })
    }
}

pub(crate) fn checkout_gateway(
    config: &IntegrationConfig,
    public_url: &str,
) -> Result<Arc<dyn CheckoutGateway>, GatewayError> {
    match &config.stripe_secret_key {
        Some(key) => Ok(Arc::new(StripeCheckoutGateway::new(
            &config.stripe_api_url,
            key.clone(),
            public_url,
        )?)),
        None => Ok(Arc::new(Unconfigured("stripe"))),
    }
}

pub(crate) fn hosted_signing_gateway(
    config: &IntegrationConfig,
) -> Result<Arc<dyn HostedSigningGateway>, GatewayError> {
    match &config.docuseal_api_key {
        Some(key) => Ok(Arc::new(DocusealGateway::new(
            &config.docuseal_api_url,
            key.clone(),
        )?)),
        None => Ok(Arc::new(Unconfigured("docuseal"))),
    }
}
