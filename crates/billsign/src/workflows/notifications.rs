use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message templates emitted by the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    SignatureRequested,
    DocumentCompleted,
    DocumentFailed,
    InvoiceSent,
    PaymentReceived,
}

impl NotificationTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationTemplate::SignatureRequested => "signature_requested",
            NotificationTemplate::DocumentCompleted => "document_completed",
            NotificationTemplate::DocumentFailed => "document_failed",
            NotificationTemplate::InvoiceSent => "invoice_sent",
            NotificationTemplate::PaymentReceived => "payment_received",
        }
    }
}

/// Outbound message handed to the mail collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub recipient: String,
    pub subject: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(
        template: NotificationTemplate,
        recipient: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            template,
            recipient: recipient.into(),
            subject: subject.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Trait describing the outbound mail hook (SMTP adapters live outside this crate).
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
