use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use warpstore_application::infrastructure_config::StorageBackend;
use warpstore_application::ports::outgoing::collaborators::Actor;
use warpstore_cli::args::Cli;
use warpstore_cli::commands;
use warpstore_cli::config_loader;
use warpstore_cli::console::ConsoleActor;
use warpstore_cli::observability;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config_loader::load_config(cli.config.as_deref())?;

    observability::tracing::setup_logging(&config)?;

    let backend = cli
        .backend
        .map_or(config.storage.backend, StorageBackend::from);
    info!(?backend, "Configuration loaded successfully");

    let console = ConsoleActor;
    match commands::run(cli.command, &config, backend).await {
        Ok(outcome) => {
            console.send_message(&outcome.message);
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            console.send_message(&e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
