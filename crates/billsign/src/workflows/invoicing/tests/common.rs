use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::invoicing::domain::{
    Customer, CustomerDraft, CustomerId, Invoice, InvoiceDraft, InvoiceId, LineItemDraft,
    Payment, PaymentDraft, PaymentId, PaymentMethod,
};
use crate::workflows::invoicing::repository::{InvoicingRepository, RepositoryError};
use crate::workflows::invoicing::InvoicingService;
use crate::workflows::notifications::{Notification, NotificationDispatcher, NotificationError};

pub(crate) type TestService = InvoicingService<MemoryLedger, MemoryNotifier>;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn customer_draft(name: &str, email: &str) -> CustomerDraft {
    CustomerDraft {
        name: name.to_string(),
        email: email.to_string(),
        phone: Some("+1 555 0100".to_string()),
        address: None,
    }
}

/// One line of two hours at 50, 10% tax, 5% discount.
pub(crate) fn invoice_draft(customer_id: &CustomerId) -> InvoiceDraft {
    InvoiceDraft {
        customer_id: customer_id.clone(),
        issue_date: date(2026, 3, 1),
        due_date: date(2026, 3, 31),
        items: vec![LineItemDraft {
            description: "Consulting".to_string(),
            quantity: 2.0,
            rate: 50.0,
        }],
        tax: 10.0,
        discount: 5.0,
        notes: Some("Net 30".to_string()),
    }
}

pub(crate) fn payment(invoice_id: &InvoiceId, amount: f64) -> PaymentDraft {
    PaymentDraft {
        invoice_id: invoice_id.clone(),
        amount,
        paid_on: date(2026, 3, 15),
        method: PaymentMethod::BankTransfer,
        reference: Some("wire-42".to_string()),
    }
}

pub(crate) fn build_service() -> (TestService, Arc<MemoryLedger>, Arc<MemoryNotifier>) {
    let ledger = Arc::new(MemoryLedger::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = InvoicingService::new(ledger.clone(), notifier.clone());
    (service, ledger, notifier)
}

/// A customer with one unpaid 104.50 invoice.
pub(crate) fn billed_customer(service: &TestService) -> (Customer, Invoice) {
    let customer = service
        .create_customer(customer_draft("Acme Corp", "billing@acme.test"))
        .expect("customer created");
    let invoice = service
        .create_invoice(invoice_draft(&customer.id))
        .expect("invoice created");
    (customer, invoice)
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
struct Ledger {
    customers: BTreeMap<CustomerId, Customer>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    payments: BTreeMap<PaymentId, Payment>,
    invoice_numbers: u64,
}

#[derive(Default, Clone)]
pub(crate) struct MemoryLedger {
    state: Arc<Mutex<Ledger>>,
    payment_gate: Option<Arc<Barrier>>,
}

impl MemoryLedger {
    /// Ledger whose `insert_payment` waits on `gate` before writing, so callers can line
    /// up concurrent payments against the same invoice snapshot.
    pub(crate) fn gated(gate: Arc<Barrier>) -> Self {
        Self {
            payment_gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn payment_count(&self) -> usize {
        self.state.lock().expect("ledger mutex poisoned").payments.len()
    }
}

impl InvoicingRepository for MemoryLedger {
    fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        if guard.customers.contains_key(&customer.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    fn update_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        let slot = guard
            .customers
            .get_mut(&customer.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = customer.clone();
        Ok(customer)
    }

    fn fetch_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard.customers.get(id).cloned())
    }

    fn list_customers(&self) -> Result<Vec<Customer>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard.customers.values().cloned().collect())
    }

    fn delete_customer(&self, id: &CustomerId) -> Result<Customer, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        guard.customers.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn next_invoice_number(&self) -> Result<u64, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        guard.invoice_numbers += 1;
        Ok(guard.invoice_numbers)
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        if guard.invoices.contains_key(&invoice.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.invoices.insert(invoice.id.clone(), invoice.clone());
        Ok(invoice)
    }

    fn update_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        let current = guard
            .invoices
            .get(&invoice.id)
            .ok_or(RepositoryError::NotFound)?;
        if current.revision != invoice.revision {
            return Err(RepositoryError::StaleRevision {
                expected: invoice.revision,
                found: current.revision,
            });
        }
        let mut stored = invoice;
        stored.revision += 1;
        guard.invoices.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard.invoices.get(id).cloned())
    }

    fn list_invoices(
        &self,
        customer: Option<&CustomerId>,
    ) -> Result<Vec<Invoice>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard
            .invoices
            .values()
            .filter(|invoice| customer.map_or(true, |id| &invoice.customer_id == id))
            .cloned()
            .collect())
    }

    fn delete_invoice(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        guard.invoices.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn insert_payment(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        if let Some(gate) = &self.payment_gate {
            gate.wait();
        }
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        guard.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard.payments.get(id).cloned())
    }

    fn payments_for(&self, invoice: &InvoiceId) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.state.lock().expect("ledger mutex poisoned");
        Ok(guard
            .payments
            .values()
            .filter(|payment| &payment.invoice_id == invoice)
            .cloned()
            .collect())
    }

    fn delete_payment(&self, id: &PaymentId) -> Result<Payment, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        guard.payments.remove(id).ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationDispatcher for MemoryNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) struct OfflineNotifier;

impl NotificationDispatcher for OfflineNotifier {
    fn dispatch(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay refused connection".to_string()))
    }
}
