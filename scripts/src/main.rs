use std::process::ExitCode;

use clap::Parser;
use scripts::{cli::Cli, constants::DEFAULT_LOG_FILTER};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing `.env` file is fine, the environment may be set directly
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().pretty().with_env_filter(filter).init();

    let (command, context) = cli.into_parts();
    match command.run(&context).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
