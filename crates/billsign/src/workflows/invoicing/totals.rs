use serde::{Deserialize, Serialize};

use super::domain::LineItem;

/// Money breakdown stored on every invoice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: f64,
    pub discount_amount: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Round to the nearest cent, halves away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Exact line value. Rounding happens once, on the invoice totals.
pub fn line_amount(quantity: f64, rate: f64) -> f64 {
    quantity * rate
}

/// Discount applies to the subtotal; tax applies to the discounted base.
pub fn calculate_invoice_totals(items: &[LineItem], tax: f64, discount: f64) -> InvoiceTotals {
    let subtotal = round_cents(items.iter().map(|item| item.amount).sum());
    let discount_amount = round_cents(subtotal * discount / 100.0);
    let tax_amount = round_cents((subtotal - discount_amount) * tax / 100.0);
    let total = round_cents(subtotal - discount_amount + tax_amount);

    InvoiceTotals {
        subtotal,
        discount_amount,
        tax_amount,
        total,
    }
}
