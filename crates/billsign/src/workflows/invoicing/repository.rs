use super::domain::{Customer, CustomerId, Invoice, InvoiceId, Payment, PaymentId};
pub use crate::workflows::repository::RepositoryError;

/// Storage abstraction for the billing ledger.
///
/// Implementations keep invoice numbers unique and hand out the next one from
/// `next_invoice_number`; the service never reuses a number after a delete.
///
/// `update_invoice` is a compare-and-swap on `Invoice::revision`: a write whose revision
/// differs from the stored one fails with `StaleRevision`, and a successful write bumps it.
pub trait InvoicingRepository: Send + Sync {
    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError>;
    fn update_customer(&self, customer: Customer) -> Result<Customer, RepositoryError>;
    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    fn list_customers(&self) -> Result<Vec<Customer>, RepositoryError>;
    fn delete_customer(&self, id: &CustomerId) -> Result<Customer, RepositoryError>;

    fn next_invoice_number(&self) -> Result<u64, RepositoryError>;
    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;
    fn update_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;
    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError>;
    fn list_invoices(
        &self,
        customer: Option<&CustomerId>,
    ) -> Result<Vec<Invoice>, RepositoryError>;
    fn delete_invoice(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError>;

    fn insert_payment(&self, payment: Payment) -> Result<Payment, RepositoryError>;
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError>;
    fn payments_for(&self, invoice: &InvoiceId) -> Result<Vec<Payment>, RepositoryError>;
    fn delete_payment(&self, id: &PaymentId) -> Result<Payment, RepositoryError>;
}
