use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hosted payment page request for one invoice balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub invoice_id: String,
    pub invoice_number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_url: String,
}

/// Request for a third-party hosted signing submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedSigningRequest {
    pub template_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl HostedSigningRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.template_id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("templateId is required".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(GatewayError::InvalidRequest(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSigningSession {
    pub token: String,
}

/// Payment provider creating checkout sessions.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

/// Third-party signing provider issuing embeddable signing tokens.
#[async_trait]
pub trait HostedSigningGateway: Send + Sync {
    async fn create_submission(
        &self,
        request: HostedSigningRequest,
    ) -> Result<HostedSigningSession, GatewayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} integration is not configured")]
    Unconfigured(&'static str),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("upstream {provider} request failed: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },
}

/// Stand-in used when a provider's credentials are absent.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl CheckoutGateway for Unconfigured {
    async fn create_session(&self, _request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::Unconfigured(self.0))
    }
}

#[async_trait]
impl HostedSigningGateway for Unconfigured {
    async fn create_submission(
        &self,
        _request: HostedSigningRequest,
    ) -> Result<HostedSigningSession, GatewayError> {
        Err(GatewayError::Unconfigured(self.0))
    }
}
