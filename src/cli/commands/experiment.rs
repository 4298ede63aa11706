//! Experiment lifecycle commands.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::commands::run::load_config;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Experiment, VariantStats};
use crate::infrastructure::database::{DatabaseConnection, SqliteExperimentStore};
use crate::services::{ConclusionCheck, ExperimentService};

#[derive(Args, Debug)]
pub struct ExperimentArgs {
    #[command(subcommand)]
    pub command: ExperimentCommands,

    /// Path to a config file (defaults to hierarchical .patter/ loading)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ExperimentCommands {
    /// List all experiments
    List,
    /// Show one experiment with per-variant statistics
    Show {
        /// Experiment ID
        experiment_id: Uuid,
    },
    /// Start a drafted experiment
    Start { experiment_id: Uuid },
    /// Pause a running experiment
    Pause { experiment_id: Uuid },
    /// Resume a paused experiment
    Resume { experiment_id: Uuid },
    /// Abort an experiment
    Abort { experiment_id: Uuid },
    /// Evaluate conclusion evidence without changing status
    Analyze { experiment_id: Uuid },
    /// Conclude the experiment if the evidence warrants it
    Conclude { experiment_id: Uuid },
    /// Promote a concluded experiment's winner to baseline
    Adopt { experiment_id: Uuid },
}

#[derive(Serialize)]
struct ExperimentListOutput {
    experiments: Vec<Experiment>,
}

impl CommandOutput for ExperimentListOutput {
    fn to_human(&self) -> String {
        if self.experiments.is_empty() {
            return "No experiments found.".to_string();
        }
        TableFormatter::new().format_experiments(&self.experiments)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct ExperimentDetailOutput {
    experiment: Experiment,
    stats: Vec<VariantStats>,
}

impl CommandOutput for ExperimentDetailOutput {
    fn to_human(&self) -> String {
        let exp = &self.experiment;
        let mut lines = vec![
            format!("Experiment: {} ({})", exp.name, exp.experiment_id),
            format!("Status:     {}", exp.status.as_str()),
            format!("Hypothesis: {}", exp.hypothesis),
            format!(
                "Samples:    {} min, {} max (alpha {})",
                exp.min_sample_size, exp.max_sample_size, exp.significance_threshold
            ),
        ];
        if let Some(winner) = exp.winning_variant_id {
            lines.push(format!("Winner:     {winner}"));
        }
        if let Some(conclusion) = &exp.conclusion {
            lines.push(format!("Conclusion: {conclusion}"));
        }
        lines.push(String::new());
        lines.push(TableFormatter::new().format_variant_stats(&self.stats));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct AnalyzeOutput {
    reason: String,
    should_conclude: bool,
    p_value: f64,
    chi_square: f64,
    significant: bool,
    winning_variant_id: Option<Uuid>,
    stats: Vec<VariantStats>,
}

impl AnalyzeOutput {
    fn from_check(check: &ConclusionCheck) -> Self {
        let mut stats = vec![check.control_stats.clone()];
        stats.extend(check.treatment_stats.iter().cloned());
        Self {
            reason: check.reason.as_str().to_string(),
            should_conclude: check.reason.should_conclude(),
            p_value: check.comparison.p_value,
            chi_square: check.comparison.chi_square,
            significant: check.comparison.significant,
            winning_variant_id: check.winning_variant_id,
            stats,
        }
    }
}

impl CommandOutput for AnalyzeOutput {
    fn to_human(&self) -> String {
        let verdict = if self.should_conclude {
            "ready to conclude"
        } else {
            "keep collecting"
        };
        format!(
            "{}\nRecommendation: {} ({})\nchi-square = {:.4}, p = {:.4}{}",
            TableFormatter::new().format_variant_stats(&self.stats),
            self.reason,
            verdict,
            self.chi_square,
            self.p_value,
            self.winning_variant_id
                .map(|id| format!("\nLeading variant: {id}"))
                .unwrap_or_default(),
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct StatusChangeOutput {
    experiment_id: Uuid,
    status: String,
    message: String,
}

impl CommandOutput for StatusChangeOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ExperimentArgs, json: bool) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let conn = DatabaseConnection::new(&config.database).await?;
    let store = Arc::new(SqliteExperimentStore::new(conn.pool()));
    let service = ExperimentService::new(store, config.experiment.clone());

    match args.command {
        ExperimentCommands::List => {
            let experiments = service.list().await?;
            output(&ExperimentListOutput { experiments }, json);
        }
        ExperimentCommands::Show { experiment_id } => {
            let experiment = service.get(experiment_id).await?;
            let stats = service.variant_stats(experiment_id).await?;
            output(&ExperimentDetailOutput { experiment, stats }, json);
        }
        ExperimentCommands::Start { experiment_id } => {
            let exp = service.start(experiment_id).await?;
            report_transition(&exp, "started", json);
        }
        ExperimentCommands::Pause { experiment_id } => {
            let exp = service.pause(experiment_id).await?;
            report_transition(&exp, "paused", json);
        }
        ExperimentCommands::Resume { experiment_id } => {
            let exp = service.resume(experiment_id).await?;
            report_transition(&exp, "resumed", json);
        }
        ExperimentCommands::Abort { experiment_id } => {
            let exp = service.abort(experiment_id).await?;
            report_transition(&exp, "aborted", json);
        }
        ExperimentCommands::Analyze { experiment_id } => {
            let check = service.check_conclusion(experiment_id).await?;
            output(&AnalyzeOutput::from_check(&check), json);
        }
        ExperimentCommands::Conclude { experiment_id } => {
            let (exp, check) = service.conclude_if_ready(experiment_id).await?;
            if check.reason.should_conclude() {
                report_transition(&exp, "concluded", json);
            } else {
                output(&AnalyzeOutput::from_check(&check), json);
            }
        }
        ExperimentCommands::Adopt { experiment_id } => {
            let winner = service.adopt_winner(experiment_id).await?;
            output(
                &StatusChangeOutput {
                    experiment_id,
                    status: "adopted".to_string(),
                    message: format!(
                        "Variant {} is now the baseline for {}",
                        winner.variant_id, winner.target_file
                    ),
                },
                json,
            );
        }
    }
    Ok(())
}

fn report_transition(exp: &Experiment, verb: &str, json: bool) {
    output(
        &StatusChangeOutput {
            experiment_id: exp.experiment_id,
            status: exp.status.as_str().to_string(),
            message: format!("Experiment {} {} ({})", exp.name, verb, exp.status.as_str()),
        },
        json,
    );
}
