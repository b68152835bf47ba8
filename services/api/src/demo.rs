use crate::infra::{DiskDocumentStorage, InMemoryDocumentRepository, InMemoryLedger, TracingNotifier};
use billsign::config::SigningConfig;
use billsign::error::AppError;
use billsign::workflows::invoicing::{
    calculate_invoice_totals, CustomerDraft, InvoiceDraft, InvoiceTotals, InvoicingService,
    LineItem, LineItemDraft, PaymentDraft, PaymentMethod,
};
use billsign::workflows::signing::{
    DocumentSigningService, DocumentUpload, SignAction, SignaturePlacement, SignatureSubmission,
    SignerDraft,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";
const DEMO_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Business date used for invoice dates and overdue checks (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Directory for the demo upload (defaults to a folder under the system temp dir)
    #[arg(long)]
    pub(crate) storage_dir: Option<PathBuf>,
    /// Skip the signing envelope portion of the demo
    #[arg(long)]
    pub(crate) skip_signing: bool,
}

#[derive(Args, Debug)]
pub(crate) struct InvoiceTotalsArgs {
    /// Line item as DESCRIPTION:QUANTITY:RATE (repeatable)
    #[arg(long = "item", required = true, value_parser = parse_line_item)]
    pub(crate) items: Vec<LineItem>,
    /// Tax percentage applied after the discount
    #[arg(long, default_value_t = 0.0, value_parser = parse_percentage)]
    pub(crate) tax: f64,
    /// Discount percentage taken off the subtotal
    #[arg(long, default_value_t = 0.0, value_parser = parse_percentage)]
    pub(crate) discount: f64,
}

pub(crate) fn parse_line_item(raw: &str) -> Result<LineItem, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (rate, quantity, description) = match (parts.next(), parts.next(), parts.next()) {
        (Some(rate), Some(quantity), Some(description)) => (rate, quantity, description),
        _ => return Err(format!("'{raw}' must look like DESCRIPTION:QUANTITY:RATE")),
    };
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("quantity '{quantity}' is not a number"))?;
    let rate: f64 = rate
        .trim()
        .parse()
        .map_err(|_| format!("rate '{rate}' is not a number"))?;

    LineItemDraft {
        description: description.to_string(),
        quantity,
        rate,
    }
    .price()
    .map_err(|err| err.to_string())
}

pub(crate) fn parse_percentage(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("percentage must be between 0 and 100 (found {value})"));
    }
    Ok(value)
}

pub(crate) fn run_invoice_totals(args: InvoiceTotalsArgs) -> Result<(), AppError> {
    let totals = calculate_invoice_totals(&args.items, args.tax, args.discount);
    for item in &args.items {
        println!(
            "{:<32} {:>8} x {:>10.2} = {:>10.2}",
            item.description, item.quantity, item.rate, item.amount
        );
    }
    render_totals(&totals, args.tax, args.discount);
    Ok(())
}

fn render_totals(totals: &InvoiceTotals, tax: f64, discount: f64) {
    println!("Subtotal: {:.2}", totals.subtotal);
    println!("Discount ({discount}%): -{:.2}", totals.discount_amount);
    println!("Tax ({tax}%): {:.2}", totals.tax_amount);
    println!("Total: {:.2}", totals.total);
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        storage_dir,
        skip_signing,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let notifier = Arc::new(TracingNotifier::default());

    println!("Billsign demo ({today})");

    if !skip_signing {
        let root = storage_dir.unwrap_or_else(|| std::env::temp_dir().join("billsign-demo"));
        run_signing_demo(root, notifier.clone())?;
    }
    run_invoicing_demo(today, notifier.clone())?;

    let outbox = notifier.events();
    println!("\nNotifications queued: {}", outbox.len());
    for notification in outbox {
        println!(
            "  - [{}] {} -> {}",
            notification.template.label(),
            notification.subject,
            notification.recipient
        );
    }
    Ok(())
}

fn run_signing_demo(root: PathBuf, notifier: Arc<TracingNotifier>) -> Result<(), AppError> {
    let service = DocumentSigningService::new(
        Arc::new(InMemoryDocumentRepository::default()),
        Arc::new(DiskDocumentStorage::new(root)?),
        notifier,
        SigningConfig {
            public_url: "http://localhost:3000".to_string(),
        },
    );

    println!("\nSigning envelope");
    let document = service.upload(DocumentUpload {
        name: "Master services agreement".to_string(),
        file_name: "msa.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        uploader: "owner@studio.test".to_string(),
        bytes: DEMO_PDF.to_vec(),
    })?;
    println!("- uploaded {} ({} bytes)", document.id.0, document.size_bytes);

    for (name, email, page) in [
        ("Client Counsel", "counsel@client.test", 1),
        ("Studio Owner", "owner@studio.test", 2),
    ] {
        service.add_signer(
            &document.id,
            SignerDraft {
                name: name.to_string(),
                email: email.to_string(),
                placement: SignaturePlacement {
                    x: 12.0,
                    y: 85.0,
                    page,
                },
            },
        )?;
    }

    let sent = service.send(&document.id)?;
    println!("- sent to {} signers, status {}", sent.signers.len(), sent.status.label());

    for signer in &sent.signers {
        let outcome = service.submit_signature(
            &signer.token,
            SignatureSubmission {
                signature_data: Some(DEMO_SIGNATURE.to_string()),
                position: Some(signer.placement),
                action: SignAction::SaveAndSend,
            },
        )?;
        println!(
            "- {} signed{}",
            signer.email,
            if outcome.document_completed {
                ", envelope complete"
            } else {
                ""
            }
        );
    }

    let finished = service.get(&document.id)?;
    println!("- final status {}", finished.status.label());
    service.delete(&document.id)?;
    Ok(())
}

fn run_invoicing_demo(today: NaiveDate, notifier: Arc<TracingNotifier>) -> Result<(), AppError> {
    let service = InvoicingService::new(Arc::new(InMemoryLedger::default()), notifier);

    println!("\nInvoicing");
    let customer = service.create_customer(CustomerDraft {
        name: "Acme Corp".to_string(),
        email: "billing@acme.test".to_string(),
        phone: Some("+1 555 0100".to_string()),
        address: None,
    })?;
    let invoice = service.create_invoice(InvoiceDraft {
        customer_id: customer.id.clone(),
        issue_date: today,
        due_date: today + Duration::days(30),
        items: vec![
            LineItemDraft {
                description: "Design sprint".to_string(),
                quantity: 2.0,
                rate: 50.0,
            },
            LineItemDraft {
                description: "Hosting".to_string(),
                quantity: 3.0,
                rate: 19.99,
            },
        ],
        tax: 10.0,
        discount: 5.0,
        notes: Some("Net 30".to_string()),
    })?;
    println!("- {} for {}", invoice.number, customer.name);
    render_totals(&invoice.totals, invoice.tax, invoice.discount);

    service.send_invoice(&invoice.id)?;
    let half = (invoice.totals.total / 2.0 * 100.0).round() / 100.0;
    let partial = service.record_payment(PaymentDraft {
        invoice_id: invoice.id.clone(),
        amount: half,
        paid_on: today,
        method: PaymentMethod::BankTransfer,
        reference: Some("wire-001".to_string()),
    })?;
    println!(
        "- paid {half:.2}, balance {:.2}, status {}",
        partial.invoice.balance_due(),
        partial.invoice.status.label()
    );

    let settled = service.record_payment(PaymentDraft {
        invoice_id: invoice.id.clone(),
        amount: partial.invoice.balance_due(),
        paid_on: today,
        method: PaymentMethod::Card,
        reference: None,
    })?;
    println!("- settled, status {}", settled.invoice.status.label());

    let csv = service.export_csv(today)?;
    println!("\nCSV export");
    print!("{}", String::from_utf8_lossy(&csv));
    Ok(())
}
