use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::domain::{
    Customer, CustomerDraft, CustomerId, Invoice, InvoiceDraft, InvoiceId,
    InvoicingValidationError, Payment, PaymentDraft, PaymentId,
};
use super::export;
use super::repository::{InvoicingRepository, RepositoryError};
use super::totals::{round_cents, to_cents};
use crate::workflows::notifications::{
    Notification, NotificationDispatcher, NotificationError, NotificationTemplate,
};

static CUSTOMER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static INVOICE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_customer_id() -> CustomerId {
    let id = CUSTOMER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CustomerId(format!("cus-{id:06}"))
}

fn next_invoice_id() -> InvoiceId {
    let id = INVOICE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    InvoiceId(format!("inv-{id:06}"))
}

fn next_payment_id() -> PaymentId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{id:06}"))
}

pub fn invoice_number(sequence: u64) -> String {
    format!("INV-{sequence:04}")
}

/// Amount still owed on an invoice, ready to hand to a checkout gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingBalance {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub customer_email: Option<String>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub invoice: Invoice,
}

/// Service coordinating customers, invoices, and payments over a shared ledger.
pub struct InvoicingService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> InvoicingService<R, N>
where
    R: InvoicingRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    pub fn create_customer(&self, draft: CustomerDraft) -> Result<Customer, InvoicingServiceError> {
        draft.validate()?;
        let customer = Customer::from_draft(next_customer_id(), draft, Utc::now());
        let stored = self.repository.insert_customer(customer)?;
        info!(customer_id = %stored.id.0, "customer created");
        Ok(stored)
    }

    pub fn list_customers(&self) -> Result<Vec<Customer>, InvoicingServiceError> {
        Ok(self.repository.list_customers()?)
    }

    pub fn customer(&self, id: &CustomerId) -> Result<Customer, InvoicingServiceError> {
        self.repository
            .fetch_customer(id)?
            .ok_or(InvoicingServiceError::CustomerNotFound)
    }

    pub fn update_customer(
        &self,
        id: &CustomerId,
        draft: CustomerDraft,
    ) -> Result<Customer, InvoicingServiceError> {
        draft.validate()?;
        let mut customer = self.customer(id)?;
        customer.apply(draft);
        Ok(self.repository.update_customer(customer)?)
    }

    /// Customers with invoices on file cannot be removed.
    pub fn delete_customer(&self, id: &CustomerId) -> Result<Customer, InvoicingServiceError> {
        self.customer(id)?;
        let invoices = self.repository.list_invoices(Some(id))?.len();
        if invoices > 0 {
            return Err(InvoicingServiceError::CustomerHasInvoices { invoices });
        }
        let removed = self.repository.delete_customer(id)?;
        info!(customer_id = %id.0, "customer deleted");
        Ok(removed)
    }

    pub fn create_invoice(&self, draft: InvoiceDraft) -> Result<Invoice, InvoicingServiceError> {
        let priced = draft.price()?;
        self.customer(&draft.customer_id)?;

        let number = invoice_number(self.repository.next_invoice_number()?);
        let invoice = Invoice::new_draft(next_invoice_id(), number, &draft, priced, Utc::now());
        let stored = self.repository.insert_invoice(invoice)?;
        info!(
            invoice_id = %stored.id.0,
            number = %stored.number,
            total = stored.totals.total,
            "invoice created"
        );
        Ok(stored)
    }

    pub fn list_invoices(
        &self,
        customer: Option<&CustomerId>,
    ) -> Result<Vec<Invoice>, InvoicingServiceError> {
        Ok(self.repository.list_invoices(customer)?)
    }

    pub fn invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoicingServiceError> {
        self.repository
            .fetch_invoice(id)?
            .ok_or(InvoicingServiceError::InvoiceNotFound)
    }

    /// Replace the invoice contents and recompute totals. Locked once money has been received.
    pub fn update_invoice(
        &self,
        id: &InvoiceId,
        draft: InvoiceDraft,
    ) -> Result<Invoice, InvoicingServiceError> {
        let priced = draft.price()?;
        let mut invoice = self.invoice(id)?;
        if !self.repository.payments_for(id)?.is_empty() {
            return Err(InvoicingServiceError::InvoiceLocked);
        }
        if draft.customer_id != invoice.customer_id {
            self.customer(&draft.customer_id)?;
        }
        invoice.apply(&draft, priced, Utc::now());
        Ok(self.repository.update_invoice(invoice)?)
    }

    /// Delete an invoice along with its recorded payments.
    pub fn delete_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoicingServiceError> {
        self.invoice(id)?;
        let payments = self.repository.payments_for(id)?;
        for payment in &payments {
            self.repository.delete_payment(&payment.id)?;
        }
        let removed = self.repository.delete_invoice(id)?;
        info!(invoice_id = %id.0, payments = payments.len(), "invoice deleted");
        Ok(removed)
    }

    /// Mark a draft invoice as sent and email the customer. Resending re-notifies.
    pub fn send_invoice(&self, id: &InvoiceId) -> Result<Invoice, InvoicingServiceError> {
        let mut invoice = self.invoice(id)?;
        if invoice.is_paid() {
            return Err(InvoicingServiceError::AlreadyPaid);
        }
        let customer = self.customer(&invoice.customer_id)?;

        if invoice.sent_at.is_none() {
            let now = Utc::now();
            invoice.sent_at = Some(now);
            invoice.updated_at = now;
            invoice.refresh_status();
            invoice = self.repository.update_invoice(invoice)?;
        }

        let notice = Notification::new(
            NotificationTemplate::InvoiceSent,
            customer.email,
            format!("Invoice {} from your supplier", invoice.number),
        )
        .detail("invoice_id", invoice.id.0.clone())
        .detail("number", invoice.number.clone())
        .detail("total", format!("{:.2}", invoice.totals.total))
        .detail("due_date", invoice.due_date.to_string());
        self.notifier.dispatch(notice)?;

        info!(invoice_id = %invoice.id.0, "invoice sent");
        Ok(invoice)
    }

    /// Apply a payment to its invoice. Amounts above the outstanding balance are refused.
    ///
    /// The invoice write is a compare-and-swap, so a payment racing another one against the
    /// same balance fails with `StaleRevision` and its payment row is removed again.
    pub fn record_payment(
        &self,
        draft: PaymentDraft,
    ) -> Result<RecordedPayment, InvoicingServiceError> {
        draft.validate()?;
        let mut invoice = self.invoice(&draft.invoice_id)?;
        let balance = collectable_cents(&invoice)?;
        if to_cents(draft.amount) > balance {
            return Err(InvoicingServiceError::Overpayment {
                amount: round_cents(draft.amount),
                balance: invoice.balance_due(),
            });
        }

        let payment = Payment::from_draft(next_payment_id(), draft, Utc::now());
        let payment = self.repository.insert_payment(payment)?;
        invoice.amount_paid = round_cents(invoice.amount_paid + payment.amount);
        invoice.updated_at = payment.recorded_at;
        invoice.refresh_status();
        let invoice = match self.repository.update_invoice(invoice) {
            Ok(invoice) => invoice,
            Err(err) => {
                if let Err(rollback) = self.repository.delete_payment(&payment.id) {
                    warn!(payment_id = %payment.id.0, error = %rollback, "failed to roll back payment");
                }
                return Err(err.into());
            }
        };

        info!(
            invoice_id = %invoice.id.0,
            payment_id = %payment.id.0,
            amount = payment.amount,
            status = invoice.status.label(),
            "payment recorded"
        );
        self.payment_receipt(&invoice, &payment);
        Ok(RecordedPayment { payment, invoice })
    }

    pub fn payments(&self, invoice: &InvoiceId) -> Result<Vec<Payment>, InvoicingServiceError> {
        self.invoice(invoice)?;
        Ok(self.repository.payments_for(invoice)?)
    }

    /// Remove a payment and restore the invoice balance it settled.
    pub fn delete_payment(&self, id: &PaymentId) -> Result<Invoice, InvoicingServiceError> {
        let payment = self
            .repository
            .fetch_payment(id)?
            .ok_or(InvoicingServiceError::PaymentNotFound)?;
        let mut invoice = self.invoice(&payment.invoice_id)?;

        self.repository.delete_payment(id)?;
        invoice.amount_paid = round_cents((invoice.amount_paid - payment.amount).max(0.0));
        invoice.updated_at = Utc::now();
        invoice.refresh_status();
        let invoice = match self.repository.update_invoice(invoice) {
            Ok(invoice) => invoice,
            Err(err) => {
                if let Err(restore) = self.repository.insert_payment(payment) {
                    warn!(payment_id = %id.0, error = %restore, "failed to restore payment");
                }
                return Err(err.into());
            }
        };
        info!(invoice_id = %invoice.id.0, payment_id = %id.0, "payment removed");
        Ok(invoice)
    }

    /// Balance to collect through a hosted checkout.
    pub fn outstanding_balance(
        &self,
        id: &InvoiceId,
    ) -> Result<OutstandingBalance, InvoicingServiceError> {
        let invoice = self.invoice(id)?;
        let amount_cents = collectable_cents(&invoice)?;
        let customer_email = self
            .repository
            .fetch_customer(&invoice.customer_id)?
            .map(|customer| customer.email);

        Ok(OutstandingBalance {
            invoice_id: invoice.id,
            number: invoice.number,
            customer_email,
            amount_cents,
        })
    }

    pub fn export_csv(&self, today: NaiveDate) -> Result<Vec<u8>, InvoicingServiceError> {
        let invoices = self.repository.list_invoices(None)?;
        let customers = self.repository.list_customers()?;
        let mut buffer = Vec::new();
        export::write_invoices(&mut buffer, &invoices, &customers, today)?;
        Ok(buffer)
    }

    fn payment_receipt(&self, invoice: &Invoice, payment: &Payment) {
        let recipient = match self.repository.fetch_customer(&invoice.customer_id) {
            Ok(Some(customer)) => customer.email,
            Ok(None) => return,
            Err(err) => {
                warn!(invoice_id = %invoice.id.0, error = %err, "customer lookup failed for receipt");
                return;
            }
        };
        let notice = Notification::new(
            NotificationTemplate::PaymentReceived,
            recipient,
            format!("Payment received for invoice {}", invoice.number),
        )
        .detail("invoice_id", invoice.id.0.clone())
        .detail("amount", format!("{:.2}", payment.amount))
        .detail("balance", format!("{:.2}", invoice.balance_due()))
        .detail("status", invoice.status.label());

        if let Err(err) = self.notifier.dispatch(notice) {
            warn!(template = "payment_received", error = %err, "notification dispatch failed");
        }
    }
}

/// Balance in cents that a new payment may settle.
fn collectable_cents(invoice: &Invoice) -> Result<i64, InvoicingServiceError> {
    let balance = invoice.balance_due_cents();
    if invoice.is_paid() {
        return Err(InvoicingServiceError::AlreadyPaid);
    }
    if balance <= 0 {
        return Err(InvoicingServiceError::NothingOwed);
    }
    Ok(balance)
}

/// Error raised by the invoicing service.
#[derive(Debug, thiserror::Error)]
pub enum InvoicingServiceError {
    #[error(transparent)]
    Validation(#[from] InvoicingValidationError),
    #[error("customer not found")]
    CustomerNotFound,
    #[error("invoice not found")]
    InvoiceNotFound,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("customer still has {invoices} invoice(s) on file")]
    CustomerHasInvoices { invoices: usize },
    #[error("invoice has recorded payments and can no longer be edited")]
    InvoiceLocked,
    #[error("invoice is already paid")]
    AlreadyPaid,
    #[error("invoice has no balance to collect")]
    NothingOwed,
    #[error("payment of {amount:.2} exceeds the outstanding balance of {balance:.2}")]
    Overpayment { amount: f64, balance: f64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error("failed to write invoice export: {0}")]
    Export(#[from] csv::Error),
}

