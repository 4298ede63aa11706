//! Patter CLI entry point.

use clap::Parser;

use patter::cli::{Cli, Commands};
use patter::infrastructure::logging::Logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging config is re-read by commands that load full config; the
    // subscriber itself must exist before any of that runs.
    let logging_config = patter::domain::models::LoggingConfig::default();
    let _logging = match Logging::init(&logging_config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Run(args) => patter::cli::commands::run::execute(args, cli.json).await,
        Commands::Experiment(args) => {
            patter::cli::commands::experiment::execute(args, cli.json).await
        }
        Commands::Trigger(args) => patter::cli::commands::trigger::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        patter::cli::handle_error(err, cli.json);
    }
}
