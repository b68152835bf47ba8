mod cli;
mod demo;
mod gateways;
mod infra;
mod routes;
mod server;

use billsign::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
