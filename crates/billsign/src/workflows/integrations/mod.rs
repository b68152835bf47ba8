//! Outbound provider bridges: hosted checkout for invoice balances and third-party signing.

pub mod gateway;
pub mod router;
pub mod service;


pub use gateway::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, HostedSigningGateway,
    HostedSigningRequest, HostedSigningSession, Unconfigured,
};
pub use router::integrations_router;
pub use service::{IntegrationError, IntegrationService};
