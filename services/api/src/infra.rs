use billsign::workflows::invoicing::{
    Customer, CustomerId, Invoice, InvoiceId, InvoicingRepository, Payment, PaymentId,
};
use billsign::workflows::notifications::{Notification, NotificationDispatcher, NotificationError};
use billsign::workflows::repository::RepositoryError;
use billsign::workflows::signing::{
    Document, DocumentId, DocumentRepository, DocumentStatus, DocumentStorage, SigningToken,
    StorageError,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentRepository {
    documents: Arc<Mutex<BTreeMap<DocumentId, Document>>>,
    tokens: Arc<Mutex<HashMap<SigningToken, DocumentId>>>,
}

impl InMemoryDocumentRepository {
    fn index_tokens(&self, document: &Document) {
        let mut tokens = self.tokens.lock().expect("token index mutex poisoned");
        for signer in &document.signers {
            tokens.insert(signer.token.clone(), document.id.clone());
        }
    }
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn insert(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        if guard.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(document.id.clone(), document.clone());
        drop(guard);
        self.index_tokens(&document);
        Ok(document)
    }

    fn update(&self, document: Document) -> Result<Document, RepositoryError> {
        let mut guard = self.documents.lock().expect("repository mutex poisoned");
        let current = guard.get(&document.id).ok_or(RepositoryError::NotFound)?;
        if current.revision != document.revision {
            return Err(RepositoryError::StaleRevision {
                expected: document.revision,
                found: current.revision,
            });
        }
        let mut stored = document;
        stored.revision += 1;
        guard.insert(stored.id.clone(), stored.clone());
        drop(guard);
        self.index_tokens(&stored);
        Ok(stored)
    }

    fn fetch(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_by_token(&self, token: &SigningToken) -> Result<Option<Document>, RepositoryError> {
        let id = {
            let tokens = self.tokens.lock().expect("token index mutex poisoned");
            match tokens.get(token) {
                Some(id) => id.clone(),
                None => return Ok(None),
            }
        };
        self.fetch(&id)
    }

    fn list(&self, status: Option<DocumentStatus>) -> Result<Vec<Document>, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|document| status.map_or(true, |status| document.status == status))
            .cloned()
            .collect())
    }

    fn delete(&self, id: &DocumentId) -> Result<Document, RepositoryError> {
        let removed = self
            .documents
            .lock()
            .expect("repository mutex poisoned")
            .remove(id)
            .ok_or(RepositoryError::NotFound)?;
        let mut tokens = self.tokens.lock().expect("token index mutex poisoned");
        for signer in &removed.signers {
            tokens.remove(&signer.token);
        }
        Ok(removed)
    }
}

/// Stores uploads as `<root>/<document id>/<file name>`.
#[derive(Debug, Clone)]
pub(crate) struct DiskDocumentStorage {
    root: PathBuf,
}

impl DiskDocumentStorage {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(location);
        let escapes = relative.components().any(|component| {
            !matches!(component, std::path::Component::Normal(_))
        });
        if escapes {
            return Err(StorageError::Missing(location.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl DocumentStorage for DiskDocumentStorage {
    fn put(&self, id: &DocumentId, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let location = format!("{}/{}", id.0, file_name);
        let path = self.resolve(&location)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(location)
    }

    fn get(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(location.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, location: &str) -> Result<(), StorageError> {
        let path = self.resolve(location)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        if let Some(parent) = path.parent() {
            // Leaves non-empty directories in place.
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Ledger {
    customers: BTreeMap<CustomerId, Customer>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    payments: BTreeMap<PaymentId, Payment>,
    last_number: u64,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLedger {
    state: Arc<Mutex<Ledger>>,
}

impl InvoicingRepository for InMemoryLedger {
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
        guard.last_number += 1;
        Ok(guard.last_number)
    }

    fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        let duplicate_number = guard
            .invoices
            .values()
            .any(|existing| existing.number == invoice.number);
        if guard.invoices.contains_key(&invoice.id) || duplicate_number {
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
        let mut guard = self.state.lock().expect("ledger mutex poisoned");
        if guard.payments.contains_key(&payment.id) {
            return Err(RepositoryError::Conflict);
        }
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

const RECENT_NOTIFICATIONS: usize = 256;

/// Logs outbound mail instead of sending it and keeps the most recent messages for inspection.
#[derive(Default, Clone)]
pub(crate) struct TracingNotifier {
    recent: Arc<Mutex<VecDeque<Notification>>>,
}

impl NotificationDispatcher for TracingNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = notification.template.label(),
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification queued"
        );
        let mut recent = self.recent.lock().expect("notifier mutex poisoned");
        if recent.len() == RECENT_NOTIFICATIONS {
            recent.pop_front();
        }
        recent.push_back(notification);
        Ok(())
    }
}

impl TracingNotifier {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.recent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
