use std::collections::HashMap;
use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Customer, CustomerId, Invoice};

const HEADERS: [&str; 13] = [
    "Number",
    "Customer",
    "Email",
    "Issue Date",
    "Due Date",
    "Status",
    "Subtotal",
    "Discount",
    "Tax",
    "Total",
    "Paid",
    "Balance",
    "Overdue",
];

/// Field order must follow `HEADERS`.
#[derive(Debug, Serialize)]
struct InvoiceRow<'a> {
    number: &'a str,
    customer: &'a str,
    email: &'a str,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: &'a str,
    subtotal: String,
    discount: String,
    tax: String,
    total: String,
    paid: String,
    balance: String,
    overdue: bool,
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Write one CSV row per invoice, headers first. Unknown customers export with blank names.
pub(crate) fn write_invoices<W: Write>(
    writer: W,
    invoices: &[Invoice],
    customers: &[Customer],
    today: NaiveDate,
) -> Result<(), csv::Error> {
    let directory: HashMap<&CustomerId, &Customer> =
        customers.iter().map(|customer| (&customer.id, customer)).collect();
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HEADERS)?;

    for invoice in invoices {
        let customer = directory.get(&invoice.customer_id);
        csv_writer.serialize(InvoiceRow {
            number: &invoice.number,
            customer: customer.map_or("", |customer| customer.name.as_str()),
            email: customer.map_or("", |customer| customer.email.as_str()),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: invoice.status.label(),
            subtotal: money(invoice.totals.subtotal),
            discount: money(invoice.totals.discount_amount),
            tax: money(invoice.totals.tax_amount),
            total: money(invoice.totals.total),
            paid: money(invoice.amount_paid),
            balance: money(invoice.balance_due()),
            overdue: invoice.is_overdue(today),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
