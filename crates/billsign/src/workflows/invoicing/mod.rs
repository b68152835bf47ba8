//! Customer billing: invoices with priced line items, payments against them, and CSV export.

pub mod domain;
pub(crate) mod export;
pub mod repository;
pub mod router;
pub mod service;
pub mod totals;

#[cfg(test)]
pub(crate) mod tests;

pub use domain::{
    Customer, CustomerDraft, CustomerId, Invoice, InvoiceDraft, InvoiceId, InvoiceStatus,
    InvoiceView, InvoicingValidationError, LineItem, LineItemDraft, Payment, PaymentDraft,
    PaymentId, PaymentMethod,
};
pub use repository::{InvoicingRepository, RepositoryError};
pub use router::invoicing_router;
pub use service::{
    invoice_number, InvoicingService, InvoicingServiceError, OutstandingBalance, RecordedPayment,
};
pub use totals::{calculate_invoice_totals, line_amount, round_cents, InvoiceTotals};
