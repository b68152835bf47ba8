//! Billing scenarios exercised through the public invoicing facade.

mod common {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use billsign::workflows::invoicing::{
        Customer, CustomerId, Invoice, InvoiceId, InvoicingRepository, Payment, PaymentId,
        RepositoryError,
    };
    use billsign::workflows::notifications::{
        Notification, NotificationDispatcher, NotificationError,
    };

    #[derive(Default)]
    pub(super) struct Books {
        customers: Mutex<HashMap<CustomerId, Customer>>,
        invoices: Mutex<Vec<Invoice>>,
        payments: Mutex<Vec<Payment>>,
        numbers: Mutex<u64>,
    }

    impl InvoicingRepository for Books {
        fn insert_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
            self.customers
                .lock()
                .expect("books mutex poisoned")
                .insert(customer.id.clone(), customer.clone());
            Ok(customer)
        }

        fn update_customer(&self, customer: Customer) -> Result<Customer, RepositoryError> {
            self.insert_customer(customer)
        }

        fn fetch_customer(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
            Ok(self.customers.lock().expect("books mutex poisoned").get(id).cloned())
        }

        fn list_customers(&self) -> Result<Vec<Customer>, RepositoryError> {
            Ok(self
                .customers
                .lock()
                .expect("books mutex poisoned")
                .values()
                .cloned()
                .collect())
        }

        fn delete_customer(&self, id: &CustomerId) -> Result<Customer, RepositoryError> {
            self.customers
                .lock()
                .expect("books mutex poisoned")
                .remove(id)
                .ok_or(RepositoryError::NotFound)
        }

        fn next_invoice_number(&self) -> Result<u64, RepositoryError> {
            let mut numbers = self.numbers.lock().expect("books mutex poisoned");
            *numbers += 1;
            Ok(*numbers)
        }

        fn insert_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
            self.invoices
                .lock()
                .expect("books mutex poisoned")
                .push(invoice.clone());
            Ok(invoice)
        }

        fn update_invoice(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
            let mut invoices = self.invoices.lock().expect("books mutex poisoned");
            let slot = invoices
                .iter_mut()
                .find(|existing| existing.id == invoice.id)
                .ok_or(RepositoryError::NotFound)?;
            if slot.revision != invoice.revision {
                return Err(RepositoryError::StaleRevision {
                    expected: invoice.revision,
                    found: slot.revision,
                });
            }
            let mut stored = invoice;
            stored.revision += 1;
            *slot = stored.clone();
            Ok(stored)
        }

        fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, RepositoryError> {
            Ok(self
                .invoices
                .lock()
                .expect("books mutex poisoned")
                .iter()
                .find(|invoice| &invoice.id == id)
                .cloned())
        }

        fn list_invoices(
            &self,
            customer: Option<&CustomerId>,
        ) -> Result<Vec<Invoice>, RepositoryError> {
            Ok(self
                .invoices
                .lock()
                .expect("books mutex poisoned")
                .iter()
                .filter(|invoice| customer.map_or(true, |id| &invoice.customer_id == id))
                .cloned()
                .collect())
        }

        fn delete_invoice(&self, id: &InvoiceId) -> Result<Invoice, RepositoryError> {
            let mut invoices = self.invoices.lock().expect("books mutex poisoned");
            let index = invoices
                .iter()
                .position(|invoice| &invoice.id == id)
                .ok_or(RepositoryError::NotFound)?;
            Ok(invoices.remove(index))
        }

        fn insert_payment(&self, payment: Payment) -> Result<Payment, RepositoryError> {
            self.payments
                .lock()
                .expect("books mutex poisoned")
                .push(payment.clone());
            Ok(payment)
        }

        fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .payments
                .lock()
                .expect("books mutex poisoned")
                .iter()
                .find(|payment| &payment.id == id)
                .cloned())
        }

        fn payments_for(&self, invoice: &InvoiceId) -> Result<Vec<Payment>, RepositoryError> {
            Ok(self
                .payments
                .lock()
                .expect("books mutex poisoned")
                .iter()
                .filter(|payment| &payment.invoice_id == invoice)
                .cloned()
                .collect())
        }

        fn delete_payment(&self, id: &PaymentId) -> Result<Payment, RepositoryError> {
            let mut payments = self.payments.lock().expect("books mutex poisoned");
            let index = payments
                .iter()
                .position(|payment| &payment.id == id)
                .ok_or(RepositoryError::NotFound)?;
            Ok(payments.remove(index))
        }
    }

    #[derive(Default)]
    pub(super) struct Mailbox {
        pub(super) delivered: Mutex<Vec<Notification>>,
    }

    impl NotificationDispatcher for Mailbox {
        fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
            self.delivered
                .lock()
                .expect("mailbox mutex poisoned")
                .push(notification);
            Ok(())
        }
    }
}

use std::sync::Arc;

use chrono::NaiveDate;

use billsign::workflows::invoicing::{
    calculate_invoice_totals, line_amount, CustomerDraft, InvoiceDraft, InvoiceStatus,
    InvoicingService, InvoicingServiceError, LineItem, LineItemDraft, PaymentDraft,
    PaymentMethod,
};

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).expect("valid date")
}

#[test]
fn worked_totals_example() {
    let items = vec![LineItem {
        description: "Design sprint".to_string(),
        quantity: 2.0,
        rate: 50.0,
        amount: line_amount(2.0, 50.0),
    }];

    let totals = calculate_invoice_totals(&items, 10.0, 5.0);

    assert_eq!(
        (totals.subtotal, totals.discount_amount, totals.tax_amount, totals.total),
        (100.0, 5.0, 9.5, 104.5)
    );
}

#[test]
fn invoice_lifecycle_from_draft_to_paid_and_cleanup() {
    let books = Arc::new(common::Books::default());
    let mailbox = Arc::new(common::Mailbox::default());
    let service = InvoicingService::new(books, mailbox.clone());

    let customer = service
        .create_customer(CustomerDraft {
            name: "Initech".to_string(),
            email: "ap@initech.test".to_string(),
            phone: None,
            address: Some("4120 Freidrich Ln".to_string()),
        })
        .expect("customer created");
    let invoice = service
        .create_invoice(InvoiceDraft {
            customer_id: customer.id.clone(),
            issue_date: day(5, 1),
            due_date: day(5, 15),
            items: vec![
                LineItemDraft {
                    description: "Retainer".to_string(),
                    quantity: 1.0,
                    rate: 1200.0,
                },
                LineItemDraft {
                    description: "Hosting".to_string(),
                    quantity: 3.0,
                    rate: 19.99,
                },
            ],
            tax: 8.0,
            discount: 0.0,
            notes: None,
        })
        .expect("invoice created");
    assert_eq!(invoice.totals.subtotal, 1259.97);
    assert_eq!(invoice.totals.tax_amount, 100.8);
    assert_eq!(invoice.totals.total, 1360.77);

    service.send_invoice(&invoice.id).expect("invoice sent");
    assert!(service.invoice(&invoice.id).expect("readable").is_overdue(day(5, 16)));

    let first = service
        .record_payment(PaymentDraft {
            invoice_id: invoice.id.clone(),
            amount: 1000.0,
            paid_on: day(5, 10),
            method: PaymentMethod::Check,
            reference: Some("#1182".to_string()),
        })
        .expect("first payment");
    assert_eq!(first.invoice.status, InvoiceStatus::PartiallyPaid);

    let rest = service
        .record_payment(PaymentDraft {
            invoice_id: invoice.id.clone(),
            amount: 360.77,
            paid_on: day(5, 12),
            method: PaymentMethod::Card,
            reference: None,
        })
        .expect("final payment");
    assert_eq!(rest.invoice.status, InvoiceStatus::Paid);
    assert!(!rest.invoice.is_overdue(day(6, 1)));

    assert!(matches!(
        service.delete_customer(&customer.id),
        Err(InvoicingServiceError::CustomerHasInvoices { .. })
    ));
    service.delete_invoice(&invoice.id).expect("invoice deleted");
    assert!(matches!(
        service.payments(&invoice.id),
        Err(InvoicingServiceError::InvoiceNotFound)
    ));
    service.delete_customer(&customer.id).expect("customer deleted");

    assert_eq!(
        mailbox.delivered.lock().expect("mailbox mutex poisoned").len(),
        3
    );
}
