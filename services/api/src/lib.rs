mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use apply_forms::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
