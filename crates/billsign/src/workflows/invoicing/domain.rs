use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::totals::{calculate_invoice_totals, line_amount, round_cents, to_cents, InvoiceTotals};

/// Identifier wrapper for billed customers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Incoming customer payload for create and update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl CustomerDraft {
    pub fn validate(&self) -> Result<(), InvoicingValidationError> {
        if self.name.trim().is_empty() {
            return Err(InvoicingValidationError::MissingCustomerName);
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(InvoicingValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Customer {
    pub fn from_draft(id: CustomerId, draft: CustomerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            email: draft.email.trim().to_string(),
            phone: non_blank(draft.phone),
            address: non_blank(draft.address),
            created_at: now,
        }
    }

    pub fn apply(&mut self, draft: CustomerDraft) {
        self.name = draft.name.trim().to_string();
        self.email = draft.email.trim().to_string();
        self.phone = non_blank(draft.phone);
        self.address = non_blank(draft.address);
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
}

/// Priced invoice line; `amount` is exactly `quantity * rate`, unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

impl LineItemDraft {
    /// Validate the line and compute its amount.
    pub fn price(self) -> Result<LineItem, InvoicingValidationError> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(InvoicingValidationError::MissingDescription);
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(InvoicingValidationError::InvalidQuantity(self.quantity));
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(InvoicingValidationError::InvalidRate(self.rate));
        }
        Ok(LineItem {
            description,
            quantity: self.quantity,
            rate: self.rate,
            amount: line_amount(self.quantity, self.rate),
        })
    }
}

/// Incoming invoice payload for create and update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub customer_id: CustomerId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<LineItemDraft>,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated line items and rates ready to be stored on an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedInvoice {
    pub items: Vec<LineItem>,
    pub tax: f64,
    pub discount: f64,
    pub totals: InvoiceTotals,
}

impl InvoiceDraft {
    pub fn price(&self) -> Result<PricedInvoice, InvoicingValidationError> {
        if self.items.is_empty() {
            return Err(InvoicingValidationError::NoLineItems);
        }
        if self.due_date < self.issue_date {
            return Err(InvoicingValidationError::DueBeforeIssue);
        }
        let percent = |value: f64| value.is_finite() && (0.0..=100.0).contains(&value);
        if !percent(self.tax) {
            return Err(InvoicingValidationError::InvalidPercentage {
                field: "tax",
                value: self.tax,
            });
        }
        if !percent(self.discount) {
            return Err(InvoicingValidationError::InvalidPercentage {
                field: "discount",
                value: self.discount,
            });
        }

        let items = self
            .items
            .iter()
            .cloned()
            .map(LineItemDraft::price)
            .collect::<Result<Vec<_>, _>>()?;
        let totals = calculate_invoice_totals(&items, self.tax, self.discount);

        Ok(PricedInvoice {
            items,
            tax: self.tax,
            discount: self.discount,
            totals,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    PartiallyPaid,
    Paid,
}

impl InvoiceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub customer_id: CustomerId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<LineItem>,
    pub tax: f64,
    pub discount: f64,
    pub totals: InvoiceTotals,
    pub amount_paid: f64,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every persisted change; repositories reject stale writes.
    pub revision: u64,
}

impl Invoice {
    pub fn balance_due(&self) -> f64 {
        round_cents(self.totals.total - self.amount_paid)
    }

    pub fn balance_due_cents(&self) -> i64 {
        to_cents(self.totals.total) - to_cents(self.amount_paid)
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Unpaid invoices past their due date. Not stored; derived on every read.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_paid() && self.due_date < today
    }

    pub fn apply(&mut self, draft: &InvoiceDraft, priced: PricedInvoice, now: DateTime<Utc>) {
        self.customer_id = draft.customer_id.clone();
        self.issue_date = draft.issue_date;
        self.due_date = draft.due_date;
        self.items = priced.items;
        self.tax = priced.tax;
        self.discount = priced.discount;
        self.totals = priced.totals;
        self.notes = non_blank(draft.notes.clone());
        self.updated_at = now;
        self.refresh_status();
    }

    /// Derive the payment status from the amount received. Drafts with no payments stay drafts.
    pub fn refresh_status(&mut self) {
        let paid = to_cents(self.amount_paid);
        self.status = if paid > 0 && paid >= to_cents(self.totals.total) {
            InvoiceStatus::Paid
        } else if paid > 0 {
            InvoiceStatus::PartiallyPaid
        } else if self.sent_at.is_some() {
            InvoiceStatus::Sent
        } else {
            InvoiceStatus::Draft
        };
    }

    pub fn view(&self, today: NaiveDate) -> InvoiceView {
        InvoiceView {
            balance_due: self.balance_due(),
            overdue: self.is_overdue(today),
            invoice: self.clone(),
        }
    }

    pub(crate) fn new_draft(
        id: InvoiceId,
        number: String,
        draft: &InvoiceDraft,
        priced: PricedInvoice,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            customer_id: draft.customer_id.clone(),
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            items: priced.items,
            tax: priced.tax,
            discount: priced.discount,
            totals: priced.totals,
            amount_paid: 0.0,
            status: InvoiceStatus::Draft,
            notes: non_blank(draft.notes.clone()),
            sent_at: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}

/// Invoice as returned to clients, with the derived balance and overdue flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub balance_due: f64,
    pub overdue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Check,
    Other,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub invoice_id: InvoiceId,
    pub amount: f64,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentDraft {
    pub fn validate(&self) -> Result<(), InvoicingValidationError> {
        if !self.amount.is_finite() || to_cents(self.amount) <= 0 {
            return Err(InvoicingValidationError::NonPositivePayment(self.amount));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: f64,
    pub paid_on: NaiveDate,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    pub fn from_draft(id: PaymentId, draft: PaymentDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            invoice_id: draft.invoice_id,
            amount: round_cents(draft.amount),
            paid_on: draft.paid_on,
            method: draft.method,
            reference: non_blank(draft.reference),
            recorded_at: now,
        }
    }
}

/// Validation errors for customer, invoice, and payment payloads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvoicingValidationError {
    #[error("customer name is required")]
    MissingCustomerName,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("an invoice needs at least one line item")]
    NoLineItems,
    #[error("line item description is required")]
    MissingDescription,
    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(f64),
    #[error("rate cannot be negative (got {0})")]
    InvalidRate(f64),
    #[error("{field} must be a percentage between 0 and 100 (got {value})")]
    InvalidPercentage { field: &'static str, value: f64 },
    #[error("due date cannot be before the issue date")]
    DueBeforeIssue,
    #[error("payment amount must be positive (got {0})")]
    NonPositivePayment(f64),
}
