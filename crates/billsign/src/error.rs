use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::integrations::{self, IntegrationError};
use crate::workflows::invoicing::{self, InvoicingServiceError};
use crate::workflows::signing::{self, SigningServiceError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Signing(SigningServiceError),
    Invoicing(InvoicingServiceError),
    Integration(IntegrationError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Signing(err) => write!(f, "signing error: {}", err),
            AppError::Invoicing(err) => write!(f, "invoicing error: {}", err),
            AppError::Integration(err) => write!(f, "integration error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Signing(err) => Some(err),
            AppError::Invoicing(err) => Some(err),
            AppError::Integration(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Signing(err) => signing::router::service_error(err),
            AppError::Invoicing(err) => invoicing::router::service_error(err),
            AppError::Integration(err) => integrations::router::integration_error(err),
            other => {
                let body = Json(json!({ "error": other.to_string() }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<SigningServiceError> for AppError {
    fn from(value: SigningServiceError) -> Self {
        Self::Signing(value)
    }
}

impl From<InvoicingServiceError> for AppError {
    fn from(value: InvoicingServiceError) -> Self {
        Self::Invoicing(value)
    }
}

impl From<IntegrationError> for AppError {
    fn from(value: IntegrationError) -> Self {
        Self::Integration(value)
    }
}
