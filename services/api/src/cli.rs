use crate::demo::{run_demo, run_invoice_totals, DemoArgs, InvoiceTotalsArgs};
use crate::server;
use billsign::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "billsign",
    about = "Run the invoicing and document-signing back office from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Price invoice line items without starting the server
    Invoice {
        #[command(subcommand)]
        command: InvoiceCommand,
    },
    /// Walk through a signing envelope and an invoice payment end to end
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum InvoiceCommand {
    /// Print subtotal, discount, tax and total for a set of line items
    Totals(InvoiceTotalsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the directory uploaded documents are written to
    #[arg(long)]
    pub(crate) storage_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Invoice {
            command: InvoiceCommand::Totals(args),
        } => run_invoice_totals(args),
        Command::Demo(args) => run_demo(args),
    }
}
