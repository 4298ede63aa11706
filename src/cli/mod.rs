//! CLI type definitions and dispatch.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "patter")]
#[command(about = "Patter - conversation evaluation and experimentation harness", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a test suite against the configured agent endpoint
    Run(commands::run::RunArgs),

    /// Experiment lifecycle commands
    Experiment(commands::experiment::ExperimentArgs),

    /// Fix proposal assessment commands
    Trigger(commands::trigger::TriggerArgs),
}

/// Report a command failure and exit nonzero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
