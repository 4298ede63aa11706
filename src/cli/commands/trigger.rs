//! Fix proposal assessment commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::run::load_config;
use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::database::{DatabaseConnection, SqliteExperimentStore};
use crate::services::{
    ExperimentService, FixProposal, TriggerAssessment, TriggerService,
};

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub command: TriggerCommands,

    /// Path to a config file (defaults to hierarchical .patter/ loading)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// Assess a YAML fix proposal and print the recommendation
    Assess {
        /// Path to the fix proposal YAML file
        proposal: String,
    },
    /// Assess a proposal and, when warranted, draft the experiment
    Draft {
        /// Path to the fix proposal YAML file
        proposal: String,

        /// Experiment name
        #[arg(short, long)]
        name: String,

        /// Test case ids the experiment runs against (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tests: Vec<String>,
    },
}

#[derive(Serialize)]
struct AssessOutput {
    assessment: TriggerAssessment,
    drafted_experiment_id: Option<uuid::Uuid>,
}

impl CommandOutput for AssessOutput {
    fn to_human(&self) -> String {
        let a = &self.assessment;
        let mut lines = vec![
            format!("Impact:    {} ({})", a.impact.as_str(), a.rationale),
        ];
        match &a.recommendation {
            Some(rec) => {
                lines.push(format!("Hypothesis: {}", rec.hypothesis));
                lines.push(format!(
                    "Experiment: min {} samples per arm, target {}",
                    rec.min_sample_size, rec.target_file
                ));
            }
            None => lines.push("No experiment warranted.".to_string()),
        }
        if let Some(id) = self.drafted_experiment_id {
            lines.push(format!("Drafted:   {id}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn load_proposal(path: &str) -> Result<FixProposal> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proposal file {path}"))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse proposal file {path}"))
}

pub async fn execute(args: TriggerArgs, json: bool) -> Result<()> {
    let service = TriggerService::with_defaults();

    match args.command {
        TriggerCommands::Assess { proposal } => {
            let proposal = load_proposal(&proposal)?;
            let assessment = service.assess(&proposal);
            output(
                &AssessOutput {
                    assessment,
                    drafted_experiment_id: None,
                },
                json,
            );
        }
        TriggerCommands::Draft {
            proposal,
            name,
            tests,
        } => {
            let proposal = load_proposal(&proposal)?;
            let assessment = service.assess(&proposal);

            let drafted = match &assessment.recommendation {
                Some(rec) => {
                    let config = load_config(args.config.as_deref())?;
                    let conn = DatabaseConnection::new(&config.database).await?;
                    let store = Arc::new(SqliteExperimentStore::new(conn.pool()));
                    let experiments = ExperimentService::new(store, config.experiment.clone());
                    let experiment = experiments
                        .create_from_recommendation(name, rec, tests)
                        .await?;
                    Some(experiment.experiment_id)
                }
                None => None,
            };

            output(
                &AssessOutput {
                    assessment,
                    drafted_experiment_id: drafted,
                },
                json,
            );
        }
    }
    Ok(())
}
